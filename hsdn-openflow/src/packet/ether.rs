//
// Copyright (c) The HSDN Project Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::Ipv4Addr;

use bytes::{Buf, BufMut, BytesMut};
use hsdn_utils::mac_addr::MacAddr;
use serde::{Deserialize, Serialize};

use crate::packet::{DecodeError, DecodeResult};

pub const ETHERTYPE_IPV4: u16 = 0x0800;
pub const ETHERTYPE_ARP: u16 = 0x0806;
pub const ETHERTYPE_LLDP: u16 = 0x88cc;

// Ethernet II header.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct EthernetHdr {
    pub dst: MacAddr,
    pub src: MacAddr,
    pub ethertype: u16,
}

// ARP packet (IPv4 over Ethernet).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct ArpPacket {
    pub operation: u16,
    pub sender_hw_address: MacAddr,
    pub sender_proto_address: Ipv4Addr,
    pub target_hw_address: MacAddr,
    pub target_proto_address: Ipv4Addr,
}

// ===== impl EthernetHdr =====

impl EthernetHdr {
    pub const LENGTH: usize = 14;

    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_slice(&self.dst.as_bytes());
        buf.put_slice(&self.src.as_bytes());
        buf.put_u16(self.ethertype);
    }

    pub fn decode(buf: &mut &[u8]) -> DecodeResult<EthernetHdr> {
        if buf.remaining() < Self::LENGTH {
            return Err(DecodeError::IncompleteMessage);
        }
        let mut dst = [0u8; 6];
        buf.copy_to_slice(&mut dst);
        let mut src = [0u8; 6];
        buf.copy_to_slice(&mut src);
        let ethertype = buf.get_u16();
        Ok(EthernetHdr {
            dst: dst.into(),
            src: src.into(),
            ethertype,
        })
    }
}

// ===== impl ArpPacket =====

impl ArpPacket {
    pub const LENGTH: usize = 28;

    pub const OP_REQUEST: u16 = 1;
    pub const OP_REPLY: u16 = 2;

    pub fn encode(&self, buf: &mut BytesMut) {
        // Hardware type (Ethernet), protocol type (IPv4), address sizes.
        buf.put_u16(1);
        buf.put_u16(ETHERTYPE_IPV4);
        buf.put_u8(6);
        buf.put_u8(4);
        buf.put_u16(self.operation);
        buf.put_slice(&self.sender_hw_address.as_bytes());
        buf.put_slice(&self.sender_proto_address.octets());
        buf.put_slice(&self.target_hw_address.as_bytes());
        buf.put_slice(&self.target_proto_address.octets());
    }

    pub fn decode(buf: &mut &[u8]) -> DecodeResult<ArpPacket> {
        if buf.remaining() < Self::LENGTH {
            return Err(DecodeError::IncompleteMessage);
        }
        let _hw_type = buf.get_u16();
        let _proto_type = buf.get_u16();
        let _hw_length = buf.get_u8();
        let _proto_length = buf.get_u8();
        let operation = buf.get_u16();
        let mut sender_hw = [0u8; 6];
        buf.copy_to_slice(&mut sender_hw);
        let sender_proto = Ipv4Addr::from(buf.get_u32());
        let mut target_hw = [0u8; 6];
        buf.copy_to_slice(&mut target_hw);
        let target_proto = Ipv4Addr::from(buf.get_u32());
        Ok(ArpPacket {
            operation,
            sender_hw_address: sender_hw.into(),
            sender_proto_address: sender_proto,
            target_hw_address: target_hw.into(),
            target_proto_address: target_proto,
        })
    }
}
