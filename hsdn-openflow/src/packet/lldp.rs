//
// Copyright (c) The HSDN Project Contributors
//
// SPDX-License-Identifier: MIT
//

use bytes::{Buf, BufMut, BytesMut};
use hsdn_utils::mac_addr::MacAddr;
use serde::{Deserialize, Serialize};

use crate::packet::{DecodeError, DecodeResult};

// TLV type values.
const TLV_END: u8 = 0;
const TLV_CHASSIS_ID: u8 = 1;
const TLV_PORT_ID: u8 = 2;
const TLV_TTL: u8 = 3;
const TLV_PORT_DESCRIPTION: u8 = 4;
const TLV_SYSTEM_NAME: u8 = 5;

// Chassis-ID subtypes.
const CHASSIS_ID_SUBTYPE_MAC_ADDRESS: u8 = 4;
// Port-ID subtypes.
const PORT_ID_SUBTYPE_INTERFACE_NAME: u8 = 5;

//
// LLDP data unit.
//
// Each TLV is a 9-bit length and 7-bit type header followed by the
// value:
//
//  0                   1
//  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |    Type     |     Length      |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//
// The controller crafts frames with a MAC chassis id and an
// interface-name port id carrying the decimal OpenFlow port number;
// received frames only need the system name and TTL, so other chassis
// subtypes are preserved opaquely.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct LldpPdu {
    pub chassis_id: ChassisId,
    pub port_id: String,
    pub ttl: u16,
    pub system_name: Option<String>,
    pub port_description: Option<String>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum ChassisId {
    MacAddress(MacAddr),
    Other(u8, Vec<u8>),
}

// ===== impl LldpPdu =====

impl LldpPdu {
    // TTL advertised in crafted discovery frames.
    pub const DISCOVERY_TTL: u16 = 120;

    pub fn new(
        chassis_id: MacAddr,
        port_no: u32,
        system_name: &str,
    ) -> LldpPdu {
        LldpPdu {
            chassis_id: ChassisId::MacAddress(chassis_id),
            port_id: port_no.to_string(),
            ttl: Self::DISCOVERY_TTL,
            system_name: Some(system_name.to_string()),
            port_description: Some(format!("OFPort-{port_no}")),
        }
    }

    // Encodes the LLDPDU into a bytes buffer.
    pub fn encode(&self, buf: &mut BytesMut) {
        match &self.chassis_id {
            ChassisId::MacAddress(mac_addr) => {
                put_tlv_hdr(buf, TLV_CHASSIS_ID, 7);
                buf.put_u8(CHASSIS_ID_SUBTYPE_MAC_ADDRESS);
                buf.put_slice(&mac_addr.as_bytes());
            }
            ChassisId::Other(subtype, value) => {
                put_tlv_hdr(buf, TLV_CHASSIS_ID, 1 + value.len() as u16);
                buf.put_u8(*subtype);
                buf.put_slice(value);
            }
        }
        put_tlv_hdr(buf, TLV_PORT_ID, 1 + self.port_id.len() as u16);
        buf.put_u8(PORT_ID_SUBTYPE_INTERFACE_NAME);
        buf.put_slice(self.port_id.as_bytes());
        put_tlv_hdr(buf, TLV_TTL, 2);
        buf.put_u16(self.ttl);
        if let Some(system_name) = &self.system_name {
            put_tlv_hdr(buf, TLV_SYSTEM_NAME, system_name.len() as u16);
            buf.put_slice(system_name.as_bytes());
        }
        if let Some(description) = &self.port_description {
            put_tlv_hdr(buf, TLV_PORT_DESCRIPTION, description.len() as u16);
            buf.put_slice(description.as_bytes());
        }
        put_tlv_hdr(buf, TLV_END, 0);
    }

    // Decodes an LLDPDU from a bytes buffer. The chassis-id, port-id and
    // TTL TLVs are mandatory and must come first, per IEEE 802.1AB.
    pub fn decode(data: &[u8]) -> DecodeResult<LldpPdu> {
        let mut buf = data;
        let mut chassis_id = None;
        let mut port_id = None;
        let mut ttl = None;
        let mut system_name = None;
        let mut port_description = None;

        while buf.remaining() >= 2 {
            let hdr = buf.get_u16();
            let tlv_type = (hdr >> 9) as u8;
            let tlv_len = (hdr & 0x1ff) as usize;
            if buf.remaining() < tlv_len {
                return Err(DecodeError::IncompleteMessage);
            }
            let value = &buf[..tlv_len];
            buf.advance(tlv_len);

            match tlv_type {
                TLV_END => break,
                TLV_CHASSIS_ID => {
                    let (subtype, id) = value
                        .split_first()
                        .ok_or(DecodeError::IncompleteMessage)?;
                    let id = match (*subtype, id.len()) {
                        (CHASSIS_ID_SUBTYPE_MAC_ADDRESS, MacAddr::LENGTH) => {
                            let mut mac_addr = [0u8; 6];
                            mac_addr.copy_from_slice(id);
                            ChassisId::MacAddress(mac_addr.into())
                        }
                        _ => ChassisId::Other(*subtype, id.to_vec()),
                    };
                    chassis_id = Some(id);
                }
                TLV_PORT_ID => {
                    let (_, id) = value
                        .split_first()
                        .ok_or(DecodeError::IncompleteMessage)?;
                    port_id = Some(String::from_utf8_lossy(id).to_string());
                }
                TLV_TTL => {
                    if tlv_len < 2 {
                        return Err(DecodeError::IncompleteMessage);
                    }
                    ttl = Some(u16::from_be_bytes([value[0], value[1]]));
                }
                TLV_SYSTEM_NAME => {
                    system_name =
                        Some(String::from_utf8_lossy(value).to_string());
                }
                TLV_PORT_DESCRIPTION => {
                    port_description =
                        Some(String::from_utf8_lossy(value).to_string());
                }
                _ => (),
            }
        }

        Ok(LldpPdu {
            chassis_id: chassis_id.ok_or(DecodeError::IncompleteMessage)?,
            port_id: port_id.ok_or(DecodeError::IncompleteMessage)?,
            ttl: ttl.ok_or(DecodeError::IncompleteMessage)?,
            system_name,
            port_description,
        })
    }
}

// ===== helper functions =====

fn put_tlv_hdr(buf: &mut BytesMut, tlv_type: u8, tlv_len: u16) {
    buf.put_u16(((tlv_type as u16) << 9) | (tlv_len & 0x1ff));
}
