//
// Copyright (c) The HSDN Project Contributors
//
// SPDX-License-Identifier: MIT
//

pub mod ether;
pub mod lldp;

use std::net::Ipv4Addr;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use hsdn_utils::mac_addr::MacAddr;
use ipnetwork::Ipv4Network;
use serde::{Deserialize, Serialize};

// Type aliases.
pub type DecodeResult<T> = Result<T, DecodeError>;

// The controller speaks OpenFlow 1.3 only.
pub const OFP_VERSION: u8 = 0x04;
pub const OFP_HEADER_SIZE: usize = 8;

// Reserved port numbers.
pub const OFPP_CONTROLLER: u32 = 0xfffffffd;
pub const OFPP_LOCAL: u32 = 0xfffffffe;
pub const OFPP_ANY: u32 = 0xffffffff;
pub const OFPG_ANY: u32 = 0xffffffff;
pub const OFP_NO_BUFFER: u32 = 0xffffffff;
pub const OFPCML_NO_BUFFER: u16 = 0xffff;

// Flow-mod flags.
pub const OFPFF_SEND_FLOW_REM: u16 = 1 << 0;

// Message type values.
const OFPT_HELLO: u8 = 0;
const OFPT_ERROR: u8 = 1;
const OFPT_ECHO_REQUEST: u8 = 2;
const OFPT_ECHO_REPLY: u8 = 3;
const OFPT_FEATURES_REQUEST: u8 = 5;
const OFPT_FEATURES_REPLY: u8 = 6;
const OFPT_PACKET_IN: u8 = 10;
const OFPT_FLOW_REMOVED: u8 = 11;
const OFPT_PACKET_OUT: u8 = 13;
const OFPT_FLOW_MOD: u8 = 14;
const OFPT_MULTIPART_REQUEST: u8 = 18;
const OFPT_MULTIPART_REPLY: u8 = 19;

// Multipart types.
const OFPMP_PORT_DESC: u16 = 13;

// OXM basic class and field values.
const OFPXMC_OPENFLOW_BASIC: u16 = 0x8000;
const OXM_OF_IN_PORT: u8 = 0;
const OXM_OF_ETH_DST: u8 = 3;
const OXM_OF_ETH_TYPE: u8 = 5;
const OXM_OF_IPV4_DST: u8 = 12;
const OXM_OF_ARP_OP: u8 = 21;
const OXM_OF_ARP_TPA: u8 = 23;

// Instruction/action types.
const OFPIT_APPLY_ACTIONS: u16 = 4;
const OFPAT_OUTPUT: u16 = 0;
const OFPAT_SET_FIELD: u16 = 25;

//
// OpenFlow message header.
//
//  0                   1                   2                   3
//  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |    Version    |     Type      |            Length             |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                              Xid                              |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Header {
    pub version: u8,
    pub msg_type: u8,
    pub length: u16,
    pub xid: u32,
}

// OpenFlow message subset used by the controller.
#[derive(Clone, Debug, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum Message {
    Hello,
    Error {
        err_type: u16,
        code: u16,
        data: Bytes,
    },
    EchoRequest {
        data: Bytes,
    },
    EchoReply {
        data: Bytes,
    },
    FeaturesRequest,
    FeaturesReply {
        datapath_id: u64,
        n_buffers: u32,
        n_tables: u8,
        auxiliary_id: u8,
        capabilities: u32,
    },
    PortDescRequest,
    PortDescReply {
        ports: Vec<PortDesc>,
    },
    FlowMod(FlowMod),
    FlowRemoved {
        cookie: u64,
        priority: u16,
        reason: FlowRemovedReason,
        table_id: u8,
        mtch: Match,
    },
    PacketIn {
        buffer_id: u32,
        reason: PacketInReason,
        table_id: u8,
        cookie: u64,
        mtch: Match,
        data: Bytes,
    },
    PacketOut {
        buffer_id: u32,
        in_port: u32,
        actions: Vec<Action>,
        data: Bytes,
    },
}

// Physical port description from an OFPMP_PORT_DESC reply.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct PortDesc {
    pub port_no: u32,
    pub hw_addr: MacAddr,
    pub name: String,
    pub config: u32,
    pub state: u32,
}

#[derive(Clone, Debug, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct FlowMod {
    pub cookie: u64,
    pub table_id: u8,
    pub command: FlowModCommand,
    pub idle_timeout: u16,
    pub hard_timeout: u16,
    pub priority: u16,
    pub buffer_id: u32,
    pub out_port: u32,
    pub out_group: u32,
    pub flags: u16,
    pub mtch: Match,
    pub instructions: Vec<Instruction>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum FlowModCommand {
    Add,
    Delete,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum FlowRemovedReason {
    IdleTimeout,
    HardTimeout,
    Delete,
    GroupDelete,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum PacketInReason {
    NoMatch,
    Action,
    InvalidTtl,
}

// OXM flow match.
#[derive(Clone, Debug, Default, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct Match {
    pub fields: Vec<MatchField>,
}

// OXM match field subset used by the controller. Unknown fields are
// skipped on decode.
#[derive(Clone, Copy, Debug, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum MatchField {
    InPort(u32),
    EthDst(MacAddr),
    EthType(u16),
    Ipv4Dst(Ipv4Network),
    ArpOp(u16),
    ArpTpa(Ipv4Addr),
}

#[derive(Clone, Copy, Debug, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum Action {
    Output(u32),
    SetField(MatchField),
}

#[derive(Clone, Debug, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum Instruction {
    ApplyActions(Vec<Action>),
}

// OpenFlow decode errors.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum DecodeError {
    IncompleteMessage,
    UnsupportedVersion(u8),
    UnknownMessageType(u8),
    UnknownMultipartType(u16),
    UnknownCommand(u8),
    UnknownReason(u8),
    InvalidLength(u16),
    InvalidPrefix(Ipv4Addr),
}

// ===== impl Header =====

impl Header {
    pub fn decode(data: &[u8]) -> DecodeResult<Header> {
        let mut buf = data;
        if buf.remaining() < OFP_HEADER_SIZE {
            return Err(DecodeError::IncompleteMessage);
        }
        let version = buf.get_u8();
        if version != OFP_VERSION {
            return Err(DecodeError::UnsupportedVersion(version));
        }
        let msg_type = buf.get_u8();
        let length = buf.get_u16();
        if (length as usize) < OFP_HEADER_SIZE {
            return Err(DecodeError::InvalidLength(length));
        }
        let xid = buf.get_u32();
        Ok(Header {
            version,
            msg_type,
            length,
            xid,
        })
    }
}

// ===== impl Message =====

impl Message {
    // Encodes the message, header included, into a bytes buffer.
    pub fn encode(&self, xid: u32) -> BytesMut {
        let mut buf = BytesMut::with_capacity(64);
        buf.put_u8(OFP_VERSION);
        buf.put_u8(self.msg_type());
        // Length is rewritten once the body is known.
        buf.put_u16(0);
        buf.put_u32(xid);

        match self {
            Message::Hello
            | Message::FeaturesRequest => (),
            Message::Error {
                err_type,
                code,
                data,
            } => {
                buf.put_u16(*err_type);
                buf.put_u16(*code);
                buf.put_slice(data);
            }
            Message::EchoRequest { data } | Message::EchoReply { data } => {
                buf.put_slice(data);
            }
            Message::FeaturesReply {
                datapath_id,
                n_buffers,
                n_tables,
                auxiliary_id,
                capabilities,
            } => {
                buf.put_u64(*datapath_id);
                buf.put_u32(*n_buffers);
                buf.put_u8(*n_tables);
                buf.put_u8(*auxiliary_id);
                buf.put_u16(0);
                buf.put_u32(*capabilities);
                buf.put_u32(0);
            }
            Message::PortDescRequest => {
                buf.put_u16(OFPMP_PORT_DESC);
                buf.put_u16(0);
                buf.put_u32(0);
            }
            Message::PortDescReply { ports } => {
                buf.put_u16(OFPMP_PORT_DESC);
                buf.put_u16(0);
                buf.put_u32(0);
                for port in ports {
                    port.encode(&mut buf);
                }
            }
            Message::FlowMod(flow_mod) => flow_mod.encode(&mut buf),
            Message::FlowRemoved {
                cookie,
                priority,
                reason,
                table_id,
                mtch,
            } => {
                buf.put_u64(*cookie);
                buf.put_u16(*priority);
                buf.put_u8(*reason as u8);
                buf.put_u8(*table_id);
                // Durations and counters aren't tracked by the controller.
                buf.put_u32(0);
                buf.put_u32(0);
                buf.put_u16(0);
                buf.put_u16(0);
                buf.put_u64(0);
                buf.put_u64(0);
                mtch.encode(&mut buf);
            }
            Message::PacketIn {
                buffer_id,
                reason,
                table_id,
                cookie,
                mtch,
                data,
            } => {
                buf.put_u32(*buffer_id);
                buf.put_u16(data.len() as u16);
                buf.put_u8(*reason as u8);
                buf.put_u8(*table_id);
                buf.put_u64(*cookie);
                mtch.encode(&mut buf);
                buf.put_u16(0);
                buf.put_slice(data);
            }
            Message::PacketOut {
                buffer_id,
                in_port,
                actions,
                data,
            } => {
                buf.put_u32(*buffer_id);
                buf.put_u32(*in_port);
                let actions_start = buf.len() + 2 + 6;
                buf.put_u16(0);
                buf.put_slice(&[0; 6]);
                for action in actions {
                    action.encode(&mut buf);
                }
                let actions_len = (buf.len() - actions_start) as u16;
                let pos = actions_start - 8;
                buf[pos..pos + 2].copy_from_slice(&actions_len.to_be_bytes());
                buf.put_slice(data);
            }
        }

        let length = buf.len() as u16;
        buf[2..4].copy_from_slice(&length.to_be_bytes());
        buf
    }

    // Decodes one full framed message (header included).
    pub fn decode(data: &[u8]) -> DecodeResult<(Header, Message)> {
        let header = Header::decode(data)?;
        if data.len() < header.length as usize {
            return Err(DecodeError::IncompleteMessage);
        }
        let mut buf = &data[OFP_HEADER_SIZE..header.length as usize];

        let msg = match header.msg_type {
            OFPT_HELLO => Message::Hello,
            OFPT_ERROR => {
                ensure(buf.remaining() >= 4)?;
                let err_type = buf.get_u16();
                let code = buf.get_u16();
                Message::Error {
                    err_type,
                    code,
                    data: Bytes::copy_from_slice(buf),
                }
            }
            OFPT_ECHO_REQUEST => Message::EchoRequest {
                data: Bytes::copy_from_slice(buf),
            },
            OFPT_ECHO_REPLY => Message::EchoReply {
                data: Bytes::copy_from_slice(buf),
            },
            OFPT_FEATURES_REQUEST => Message::FeaturesRequest,
            OFPT_FEATURES_REPLY => {
                ensure(buf.remaining() >= 24)?;
                let datapath_id = buf.get_u64();
                let n_buffers = buf.get_u32();
                let n_tables = buf.get_u8();
                let auxiliary_id = buf.get_u8();
                let _ = buf.get_u16();
                let capabilities = buf.get_u32();
                let _ = buf.get_u32();
                Message::FeaturesReply {
                    datapath_id,
                    n_buffers,
                    n_tables,
                    auxiliary_id,
                    capabilities,
                }
            }
            OFPT_MULTIPART_REQUEST => {
                ensure(buf.remaining() >= 8)?;
                let mp_type = buf.get_u16();
                if mp_type != OFPMP_PORT_DESC {
                    return Err(DecodeError::UnknownMultipartType(mp_type));
                }
                Message::PortDescRequest
            }
            OFPT_MULTIPART_REPLY => {
                ensure(buf.remaining() >= 8)?;
                let mp_type = buf.get_u16();
                if mp_type != OFPMP_PORT_DESC {
                    return Err(DecodeError::UnknownMultipartType(mp_type));
                }
                let _flags = buf.get_u16();
                let _ = buf.get_u32();
                let mut ports = vec![];
                while buf.has_remaining() {
                    ports.push(PortDesc::decode(&mut buf)?);
                }
                Message::PortDescReply { ports }
            }
            OFPT_FLOW_MOD => Message::FlowMod(FlowMod::decode(&mut buf)?),
            OFPT_FLOW_REMOVED => {
                ensure(buf.remaining() >= 40)?;
                let cookie = buf.get_u64();
                let priority = buf.get_u16();
                let reason = FlowRemovedReason::decode(buf.get_u8())?;
                let table_id = buf.get_u8();
                let _duration_sec = buf.get_u32();
                let _duration_nsec = buf.get_u32();
                let _idle_timeout = buf.get_u16();
                let _hard_timeout = buf.get_u16();
                let _packet_count = buf.get_u64();
                let _byte_count = buf.get_u64();
                let mtch = Match::decode(&mut buf)?;
                Message::FlowRemoved {
                    cookie,
                    priority,
                    reason,
                    table_id,
                    mtch,
                }
            }
            OFPT_PACKET_IN => {
                ensure(buf.remaining() >= 16)?;
                let buffer_id = buf.get_u32();
                let _total_len = buf.get_u16();
                let reason = PacketInReason::decode(buf.get_u8())?;
                let table_id = buf.get_u8();
                let cookie = buf.get_u64();
                let mtch = Match::decode(&mut buf)?;
                ensure(buf.remaining() >= 2)?;
                let _ = buf.get_u16();
                Message::PacketIn {
                    buffer_id,
                    reason,
                    table_id,
                    cookie,
                    mtch,
                    data: Bytes::copy_from_slice(buf),
                }
            }
            OFPT_PACKET_OUT => {
                ensure(buf.remaining() >= 16)?;
                let buffer_id = buf.get_u32();
                let in_port = buf.get_u32();
                let actions_len = buf.get_u16() as usize;
                buf.advance(6);
                ensure(buf.remaining() >= actions_len)?;
                let mut actions_buf = &buf[..actions_len];
                buf.advance(actions_len);
                let mut actions = vec![];
                while actions_buf.has_remaining() {
                    actions.push(Action::decode(&mut actions_buf)?);
                }
                Message::PacketOut {
                    buffer_id,
                    in_port,
                    actions,
                    data: Bytes::copy_from_slice(buf),
                }
            }
            msg_type => return Err(DecodeError::UnknownMessageType(msg_type)),
        };

        Ok((header, msg))
    }

    fn msg_type(&self) -> u8 {
        match self {
            Message::Hello => OFPT_HELLO,
            Message::Error { .. } => OFPT_ERROR,
            Message::EchoRequest { .. } => OFPT_ECHO_REQUEST,
            Message::EchoReply { .. } => OFPT_ECHO_REPLY,
            Message::FeaturesRequest => OFPT_FEATURES_REQUEST,
            Message::FeaturesReply { .. } => OFPT_FEATURES_REPLY,
            Message::PortDescRequest => OFPT_MULTIPART_REQUEST,
            Message::PortDescReply { .. } => OFPT_MULTIPART_REPLY,
            Message::FlowMod(_) => OFPT_FLOW_MOD,
            Message::FlowRemoved { .. } => OFPT_FLOW_REMOVED,
            Message::PacketIn { .. } => OFPT_PACKET_IN,
            Message::PacketOut { .. } => OFPT_PACKET_OUT,
        }
    }
}

// ===== impl PortDesc =====

impl PortDesc {
    const ENCODED_SIZE: usize = 64;

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32(self.port_no);
        buf.put_u32(0);
        buf.put_slice(&self.hw_addr.as_bytes());
        buf.put_u16(0);
        let mut name = [0u8; 16];
        let bytes = self.name.as_bytes();
        let len = bytes.len().min(15);
        name[..len].copy_from_slice(&bytes[..len]);
        buf.put_slice(&name);
        buf.put_u32(self.config);
        buf.put_u32(self.state);
        // Port speed/feature fields aren't used by the controller.
        buf.put_slice(&[0; 24]);
    }

    fn decode(buf: &mut &[u8]) -> DecodeResult<PortDesc> {
        ensure(buf.remaining() >= Self::ENCODED_SIZE)?;
        let port_no = buf.get_u32();
        buf.advance(4);
        let mut hw_addr = [0u8; 6];
        buf.copy_to_slice(&mut hw_addr);
        buf.advance(2);
        let mut name = [0u8; 16];
        buf.copy_to_slice(&mut name);
        let name = String::from_utf8_lossy(&name)
            .trim_end_matches('\0')
            .to_string();
        let config = buf.get_u32();
        let state = buf.get_u32();
        buf.advance(24);
        Ok(PortDesc {
            port_no,
            hw_addr: hw_addr.into(),
            name,
            config,
            state,
        })
    }
}

// ===== impl FlowMod =====

impl Default for FlowMod {
    fn default() -> FlowMod {
        FlowMod {
            cookie: 0,
            table_id: 0,
            command: FlowModCommand::Add,
            idle_timeout: 0,
            hard_timeout: 0,
            priority: 0,
            buffer_id: OFP_NO_BUFFER,
            out_port: 0,
            out_group: 0,
            flags: 0,
            mtch: Match::default(),
            instructions: vec![],
        }
    }
}

impl FlowMod {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u64(self.cookie);
        // Cookie mask.
        buf.put_u64(0);
        buf.put_u8(self.table_id);
        buf.put_u8(u8::from(self.command));
        buf.put_u16(self.idle_timeout);
        buf.put_u16(self.hard_timeout);
        buf.put_u16(self.priority);
        buf.put_u32(self.buffer_id);
        buf.put_u32(self.out_port);
        buf.put_u32(self.out_group);
        buf.put_u16(self.flags);
        buf.put_u16(0);
        self.mtch.encode(buf);
        for instruction in &self.instructions {
            instruction.encode(buf);
        }
    }

    fn decode(buf: &mut &[u8]) -> DecodeResult<FlowMod> {
        ensure(buf.remaining() >= 40)?;
        let cookie = buf.get_u64();
        let _cookie_mask = buf.get_u64();
        let table_id = buf.get_u8();
        let command = FlowModCommand::decode(buf.get_u8())?;
        let idle_timeout = buf.get_u16();
        let hard_timeout = buf.get_u16();
        let priority = buf.get_u16();
        let buffer_id = buf.get_u32();
        let out_port = buf.get_u32();
        let out_group = buf.get_u32();
        let flags = buf.get_u16();
        let _ = buf.get_u16();
        let mtch = Match::decode(buf)?;
        let mut instructions = vec![];
        while buf.has_remaining() {
            instructions.push(Instruction::decode(buf)?);
        }
        Ok(FlowMod {
            cookie,
            table_id,
            command,
            idle_timeout,
            hard_timeout,
            priority,
            buffer_id,
            out_port,
            out_group,
            flags,
            mtch,
            instructions,
        })
    }
}

// ===== impl FlowModCommand =====

impl FlowModCommand {
    fn decode(value: u8) -> DecodeResult<FlowModCommand> {
        match value {
            0 => Ok(FlowModCommand::Add),
            3 => Ok(FlowModCommand::Delete),
            _ => Err(DecodeError::UnknownCommand(value)),
        }
    }
}

impl From<FlowModCommand> for u8 {
    fn from(command: FlowModCommand) -> u8 {
        match command {
            FlowModCommand::Add => 0,
            FlowModCommand::Delete => 3,
        }
    }
}

// ===== impl FlowRemovedReason =====

impl FlowRemovedReason {
    fn decode(value: u8) -> DecodeResult<FlowRemovedReason> {
        match value {
            0 => Ok(FlowRemovedReason::IdleTimeout),
            1 => Ok(FlowRemovedReason::HardTimeout),
            2 => Ok(FlowRemovedReason::Delete),
            3 => Ok(FlowRemovedReason::GroupDelete),
            _ => Err(DecodeError::UnknownReason(value)),
        }
    }
}

// ===== impl PacketInReason =====

impl PacketInReason {
    fn decode(value: u8) -> DecodeResult<PacketInReason> {
        match value {
            0 => Ok(PacketInReason::NoMatch),
            1 => Ok(PacketInReason::Action),
            2 => Ok(PacketInReason::InvalidTtl),
            _ => Err(DecodeError::UnknownReason(value)),
        }
    }
}

// ===== impl Match =====

impl Match {
    pub fn new(fields: Vec<MatchField>) -> Match {
        Match { fields }
    }

    // In-port of a packet-in match, when present.
    pub fn in_port(&self) -> Option<u32> {
        self.fields.iter().find_map(|field| match field {
            MatchField::InPort(port_no) => Some(*port_no),
            _ => None,
        })
    }

    fn encode(&self, buf: &mut BytesMut) {
        let start = buf.len();
        // OFPMT_OXM.
        buf.put_u16(1);
        buf.put_u16(0);
        for field in &self.fields {
            field.encode(buf);
        }
        let length = (buf.len() - start) as u16;
        buf[start + 2..start + 4].copy_from_slice(&length.to_be_bytes());
        let pad = (8 - (length as usize % 8)) % 8;
        buf.put_slice(&vec![0; pad]);
    }

    fn decode(buf: &mut &[u8]) -> DecodeResult<Match> {
        ensure(buf.remaining() >= 4)?;
        let _match_type = buf.get_u16();
        let length = buf.get_u16() as usize;
        if length < 4 {
            return Err(DecodeError::InvalidLength(length as u16));
        }
        let oxm_len = length - 4;
        ensure(buf.remaining() >= oxm_len)?;
        let mut oxm_buf = &buf[..oxm_len];
        buf.advance(oxm_len);
        let pad = (8 - (length % 8)) % 8;
        ensure(buf.remaining() >= pad)?;
        buf.advance(pad);

        let mut fields = vec![];
        while oxm_buf.has_remaining() {
            if let Some(field) = MatchField::decode(&mut oxm_buf)? {
                fields.push(field);
            }
        }
        Ok(Match { fields })
    }
}

// ===== impl MatchField =====

impl MatchField {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u16(OFPXMC_OPENFLOW_BASIC);
        match self {
            MatchField::InPort(port_no) => {
                buf.put_u8(OXM_OF_IN_PORT << 1);
                buf.put_u8(4);
                buf.put_u32(*port_no);
            }
            MatchField::EthDst(mac_addr) => {
                buf.put_u8(OXM_OF_ETH_DST << 1);
                buf.put_u8(6);
                buf.put_slice(&mac_addr.as_bytes());
            }
            MatchField::EthType(eth_type) => {
                buf.put_u8(OXM_OF_ETH_TYPE << 1);
                buf.put_u8(2);
                buf.put_u16(*eth_type);
            }
            MatchField::Ipv4Dst(network) => {
                if network.prefix() == 32 {
                    buf.put_u8(OXM_OF_IPV4_DST << 1);
                    buf.put_u8(4);
                    buf.put_slice(&network.ip().octets());
                } else {
                    buf.put_u8((OXM_OF_IPV4_DST << 1) | 1);
                    buf.put_u8(8);
                    buf.put_slice(&network.network().octets());
                    buf.put_slice(&network.mask().octets());
                }
            }
            MatchField::ArpOp(op) => {
                buf.put_u8(OXM_OF_ARP_OP << 1);
                buf.put_u8(2);
                buf.put_u16(*op);
            }
            MatchField::ArpTpa(addr) => {
                buf.put_u8(OXM_OF_ARP_TPA << 1);
                buf.put_u8(4);
                buf.put_slice(&addr.octets());
            }
        }
    }

    // Decodes one OXM TLV; unknown fields are skipped and yield `None`.
    fn decode(buf: &mut &[u8]) -> DecodeResult<Option<MatchField>> {
        ensure(buf.remaining() >= 4)?;
        let class = buf.get_u16();
        let field_hm = buf.get_u8();
        let length = buf.get_u8() as usize;
        ensure(buf.remaining() >= length)?;
        let field = field_hm >> 1;
        let has_mask = field_hm & 1 != 0;

        if class != OFPXMC_OPENFLOW_BASIC {
            buf.advance(length);
            return Ok(None);
        }

        let field = match (field, has_mask) {
            (OXM_OF_IN_PORT, false) if length == 4 => {
                Some(MatchField::InPort(buf.get_u32()))
            }
            (OXM_OF_ETH_DST, false) if length == 6 => {
                let mut mac_addr = [0u8; 6];
                buf.copy_to_slice(&mut mac_addr);
                Some(MatchField::EthDst(mac_addr.into()))
            }
            (OXM_OF_ETH_TYPE, false) if length == 2 => {
                Some(MatchField::EthType(buf.get_u16()))
            }
            (OXM_OF_IPV4_DST, false) if length == 4 => {
                let addr = Ipv4Addr::from(buf.get_u32());
                let network = Ipv4Network::new(addr, 32)
                    .map_err(|_| DecodeError::InvalidPrefix(addr))?;
                Some(MatchField::Ipv4Dst(network))
            }
            (OXM_OF_IPV4_DST, true) if length == 8 => {
                let addr = Ipv4Addr::from(buf.get_u32());
                let mask = buf.get_u32();
                let prefix = mask.leading_ones() as u8;
                let network = Ipv4Network::new(addr, prefix)
                    .map_err(|_| DecodeError::InvalidPrefix(addr))?;
                Some(MatchField::Ipv4Dst(network))
            }
            (OXM_OF_ARP_OP, false) if length == 2 => {
                Some(MatchField::ArpOp(buf.get_u16()))
            }
            (OXM_OF_ARP_TPA, false) if length == 4 => {
                Some(MatchField::ArpTpa(Ipv4Addr::from(buf.get_u32())))
            }
            _ => {
                buf.advance(length);
                None
            }
        };
        Ok(field)
    }

    // Encoded OXM TLV size, header included.
    fn encoded_size(&self) -> usize {
        4 + match self {
            MatchField::InPort(_) => 4,
            MatchField::EthDst(_) => 6,
            MatchField::EthType(_) => 2,
            MatchField::Ipv4Dst(network) if network.prefix() == 32 => 4,
            MatchField::Ipv4Dst(_) => 8,
            MatchField::ArpOp(_) => 2,
            MatchField::ArpTpa(_) => 4,
        }
    }
}

// ===== impl Action =====

impl Action {
    fn encode(&self, buf: &mut BytesMut) {
        match self {
            Action::Output(port_no) => {
                buf.put_u16(OFPAT_OUTPUT);
                buf.put_u16(16);
                buf.put_u32(*port_no);
                buf.put_u16(OFPCML_NO_BUFFER);
                buf.put_slice(&[0; 6]);
            }
            Action::SetField(field) => {
                let oxm_size = field.encoded_size();
                let length = (4 + oxm_size).next_multiple_of(8);
                buf.put_u16(OFPAT_SET_FIELD);
                buf.put_u16(length as u16);
                field.encode(buf);
                buf.put_slice(&vec![0; length - 4 - oxm_size]);
            }
        }
    }

    fn decode(buf: &mut &[u8]) -> DecodeResult<Action> {
        ensure(buf.remaining() >= 4)?;
        let action_type = buf.get_u16();
        let length = buf.get_u16() as usize;
        if length < 8 {
            return Err(DecodeError::InvalidLength(length as u16));
        }
        ensure(buf.remaining() >= length - 4)?;
        match action_type {
            OFPAT_OUTPUT => {
                let port_no = buf.get_u32();
                let _max_len = buf.get_u16();
                buf.advance(6);
                Ok(Action::Output(port_no))
            }
            OFPAT_SET_FIELD => {
                let mut oxm_buf = &buf[..length - 4];
                buf.advance(length - 4);
                match MatchField::decode(&mut oxm_buf)? {
                    Some(field) => Ok(Action::SetField(field)),
                    None => Err(DecodeError::InvalidLength(length as u16)),
                }
            }
            _ => Err(DecodeError::UnknownMessageType(action_type as u8)),
        }
    }
}

// ===== impl Instruction =====

impl Instruction {
    fn encode(&self, buf: &mut BytesMut) {
        match self {
            Instruction::ApplyActions(actions) => {
                let start = buf.len();
                buf.put_u16(OFPIT_APPLY_ACTIONS);
                buf.put_u16(0);
                buf.put_u32(0);
                for action in actions {
                    action.encode(buf);
                }
                let length = (buf.len() - start) as u16;
                buf[start + 2..start + 4]
                    .copy_from_slice(&length.to_be_bytes());
            }
        }
    }

    fn decode(buf: &mut &[u8]) -> DecodeResult<Instruction> {
        ensure(buf.remaining() >= 8)?;
        let _instr_type = buf.get_u16();
        let length = buf.get_u16() as usize;
        if length < 8 {
            return Err(DecodeError::InvalidLength(length as u16));
        }
        let _ = buf.get_u32();
        ensure(buf.remaining() >= length - 8)?;
        let mut actions_buf = &buf[..length - 8];
        buf.advance(length - 8);
        let mut actions = vec![];
        while actions_buf.has_remaining() {
            actions.push(Action::decode(&mut actions_buf)?);
        }
        Ok(Instruction::ApplyActions(actions))
    }
}

// ===== impl DecodeError =====

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::IncompleteMessage => {
                write!(f, "incomplete message")
            }
            DecodeError::UnsupportedVersion(version) => {
                write!(f, "unsupported OpenFlow version: {version}")
            }
            DecodeError::UnknownMessageType(msg_type) => {
                write!(f, "unknown message type: {msg_type}")
            }
            DecodeError::UnknownMultipartType(mp_type) => {
                write!(f, "unknown multipart type: {mp_type}")
            }
            DecodeError::UnknownCommand(command) => {
                write!(f, "unknown flow-mod command: {command}")
            }
            DecodeError::UnknownReason(reason) => {
                write!(f, "unknown reason: {reason}")
            }
            DecodeError::InvalidLength(length) => {
                write!(f, "invalid length: {length}")
            }
            DecodeError::InvalidPrefix(addr) => {
                write!(f, "invalid prefix for address: {addr}")
            }
        }
    }
}

impl std::error::Error for DecodeError {}

// ===== helper functions =====

fn ensure(condition: bool) -> DecodeResult<()> {
    if condition {
        Ok(())
    } else {
        Err(DecodeError::IncompleteMessage)
    }
}
