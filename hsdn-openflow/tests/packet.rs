//
// Copyright (c) The HSDN Project Contributors
//
// SPDX-License-Identifier: MIT
//

use bytes::{Bytes, BytesMut};
use hsdn_openflow::packet::ether::{
    ArpPacket, ETHERTYPE_ARP, ETHERTYPE_LLDP, EthernetHdr,
};
use hsdn_openflow::packet::lldp::{ChassisId, LldpPdu};
use hsdn_openflow::packet::{
    Action, DecodeError, FlowMod, FlowModCommand, FlowRemovedReason, Header,
    Instruction, Match, MatchField, Message, OFP_NO_BUFFER, OFPFF_SEND_FLOW_REM,
    OFPG_ANY, OFPP_ANY, OFPP_CONTROLLER,
};
use hsdn_utils::mac_addr::MacAddr;

//
// Helper functions.
//

fn mac(s: &str) -> MacAddr {
    s.parse().unwrap()
}

fn test_roundtrip(msg: &Message, xid: u32) {
    let encoded = msg.encode(xid);
    let (header, decoded) = Message::decode(&encoded).unwrap();
    assert_eq!(header.xid, xid);
    assert_eq!(header.length as usize, encoded.len());
    assert_eq!(*msg, decoded);
}

//
// OpenFlow messages.
//

#[test]
fn encode_hello() {
    let encoded = Message::Hello.encode(7);
    assert_eq!(&encoded[..], [0x04, 0x00, 0x00, 0x08, 0x00, 0x00, 0x00, 0x07]);
}

#[test]
fn decode_header_rejects_other_versions() {
    let data = [0x01, 0x00, 0x00, 0x08, 0x00, 0x00, 0x00, 0x00];
    assert_eq!(
        Header::decode(&data),
        Err(DecodeError::UnsupportedVersion(0x01))
    );
}

#[test]
fn echo_roundtrip() {
    test_roundtrip(
        &Message::EchoRequest {
            data: Bytes::from_static(b"ping"),
        },
        1,
    );
    test_roundtrip(
        &Message::EchoReply {
            data: Bytes::from_static(b"ping"),
        },
        2,
    );
}

#[test]
fn features_reply_roundtrip() {
    test_roundtrip(
        &Message::FeaturesReply {
            datapath_id: 0x0000_0000_0000_002a,
            n_buffers: 256,
            n_tables: 254,
            auxiliary_id: 0,
            capabilities: 0x4f,
        },
        3,
    );
}

#[test]
fn port_desc_roundtrip() {
    test_roundtrip(&Message::PortDescRequest, 4);
    test_roundtrip(
        &Message::PortDescReply {
            ports: vec![
                hsdn_openflow::packet::PortDesc {
                    port_no: 1,
                    hw_addr: mac("aa:bb:cc:dd:ee:01"),
                    name: "s1-eth1".to_string(),
                    config: 0,
                    state: 0,
                },
                hsdn_openflow::packet::PortDesc {
                    port_no: 2,
                    hw_addr: mac("aa:bb:cc:dd:ee:02"),
                    name: "s1-eth2".to_string(),
                    config: 0,
                    state: 4,
                },
            ],
        },
        5,
    );
}

#[test]
fn flow_mod_lldp_steering() {
    // The LLDP-to-controller flow installed at datapath connect.
    let msg = Message::FlowMod(FlowMod {
        priority: 0xffff,
        mtch: Match::new(vec![MatchField::EthType(ETHERTYPE_LLDP)]),
        instructions: vec![Instruction::ApplyActions(vec![Action::Output(
            OFPP_CONTROLLER,
        )])],
        ..Default::default()
    });
    test_roundtrip(&msg, 6);

    let encoded = msg.encode(6);
    // eth_type OXM: class 0x8000, field 5 << 1, length 2, value 0x88cc.
    let oxm = [0x80, 0x00, 0x0a, 0x02, 0x88, 0xcc];
    assert!(
        encoded
            .windows(oxm.len())
            .any(|window| window == oxm)
    );
}

#[test]
fn flow_mod_dummy_retrigger_roundtrip() {
    test_roundtrip(
        &Message::FlowMod(FlowMod {
            priority: 10,
            hard_timeout: 15,
            flags: OFPFF_SEND_FLOW_REM,
            instructions: vec![Instruction::ApplyActions(vec![])],
            ..Default::default()
        }),
        7,
    );
}

#[test]
fn flow_mod_route_with_masked_destination() {
    let msg = Message::FlowMod(FlowMod {
        mtch: Match::new(vec![
            MatchField::EthType(0x0800),
            MatchField::Ipv4Dst("10.0.3.0/24".parse().unwrap()),
        ]),
        instructions: vec![Instruction::ApplyActions(vec![
            Action::SetField(MatchField::EthDst(MacAddr::BROADCAST)),
            Action::Output(2),
        ])],
        ..Default::default()
    });
    test_roundtrip(&msg, 8);

    // Masked ipv4_dst OXM: field 12 << 1 | 1, length 8, value + mask.
    let oxm = [
        0x80, 0x00, 0x19, 0x08, 0x0a, 0x00, 0x03, 0x00, 0xff, 0xff, 0xff,
        0x00,
    ];
    let encoded = msg.encode(8);
    assert!(
        encoded
            .windows(oxm.len())
            .any(|window| window == oxm)
    );
}

#[test]
fn flow_mod_delete_roundtrip() {
    test_roundtrip(
        &Message::FlowMod(FlowMod {
            command: FlowModCommand::Delete,
            out_port: OFPP_ANY,
            out_group: OFPG_ANY,
            mtch: Match::new(vec![
                MatchField::EthType(ETHERTYPE_ARP),
                MatchField::InPort(1),
                MatchField::ArpTpa("10.0.0.1".parse().unwrap()),
                MatchField::ArpOp(ArpPacket::OP_REQUEST),
            ]),
            instructions: vec![Instruction::ApplyActions(vec![
                Action::Output(OFPP_CONTROLLER),
            ])],
            ..Default::default()
        }),
        9,
    );
}

#[test]
fn flow_removed_roundtrip() {
    test_roundtrip(
        &Message::FlowRemoved {
            cookie: 0,
            priority: 10,
            reason: FlowRemovedReason::HardTimeout,
            table_id: 0,
            mtch: Match::default(),
        },
        10,
    );
}

#[test]
fn packet_in_roundtrip_carries_in_port() {
    let msg = Message::PacketIn {
        buffer_id: OFP_NO_BUFFER,
        reason: hsdn_openflow::packet::PacketInReason::Action,
        table_id: 0,
        cookie: 0,
        mtch: Match::new(vec![MatchField::InPort(3)]),
        data: Bytes::from_static(&[0xde, 0xad, 0xbe, 0xef]),
    };
    test_roundtrip(&msg, 11);

    let (_, decoded) = Message::decode(&msg.encode(11)).unwrap();
    let Message::PacketIn { mtch, .. } = decoded else {
        panic!("expected packet-in");
    };
    assert_eq!(mtch.in_port(), Some(3));
}

#[test]
fn packet_out_roundtrip() {
    test_roundtrip(
        &Message::PacketOut {
            buffer_id: OFP_NO_BUFFER,
            in_port: OFPP_CONTROLLER,
            actions: vec![Action::Output(1)],
            data: Bytes::from_static(&[0x01, 0x02, 0x03]),
        },
        12,
    );
}

//
// LLDP.
//

#[test]
fn lldp_roundtrip() {
    let pdu = LldpPdu::new(mac("aa:bb:cc:dd:ee:01"), 2, "S0");
    assert_eq!(pdu.ttl, 120);
    assert_eq!(pdu.port_id, "2");
    assert_eq!(pdu.port_description.as_deref(), Some("OFPort-2"));

    let mut buf = BytesMut::new();
    pdu.encode(&mut buf);
    let decoded = LldpPdu::decode(&buf).unwrap();
    assert_eq!(pdu, decoded);
}

#[test]
fn lldp_decode_expected_bytes() {
    let pdu = LldpPdu::new(mac("aa:bb:cc:dd:ee:01"), 1, "S0");
    let mut buf = BytesMut::new();
    pdu.encode(&mut buf);

    // Chassis-ID TLV: type 1, length 7, subtype 4 (MAC).
    assert_eq!(&buf[..4], [0x02, 0x07, 0x04, 0xaa]);
    // Terminates with the end-of-LLDPDU TLV.
    assert_eq!(&buf[buf.len() - 2..], [0x00, 0x00]);
}

#[test]
fn lldp_decode_tolerates_unknown_chassis_subtype() {
    // Chassis-id with a locally-assigned (7) subtype, as some classic
    // devices send.
    let data: Vec<u8> = vec![
        0x02, 0x03, 0x07, b'c', b'1', // chassis id
        0x04, 0x04, 0x05, b'G', b'i', b'2', // port id
        0x06, 0x02, 0x00, 0x78, // ttl 120
        0x0a, 0x02, b'C', b'1', // system name
        0x00, 0x00, // end
    ];
    let pdu = LldpPdu::decode(&data).unwrap();
    assert_eq!(pdu.chassis_id, ChassisId::Other(7, b"c1".to_vec()));
    assert_eq!(pdu.port_id, "Gi2");
    assert_eq!(pdu.ttl, 120);
    assert_eq!(pdu.system_name.as_deref(), Some("C1"));
}

#[test]
fn lldp_decode_missing_ttl_fails() {
    let data: Vec<u8> = vec![
        0x02, 0x07, 0x04, 0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0x01, // chassis
        0x04, 0x02, 0x05, b'1', // port id
        0x00, 0x00, // end
    ];
    assert_eq!(LldpPdu::decode(&data), Err(DecodeError::IncompleteMessage));
}

//
// Ethernet / ARP.
//

#[test]
fn arp_reply_frame() {
    // The responder answers a request for 10.0.0.1 heard on a port with
    // MAC aa:bb:cc:dd:ee:01.
    let request = ArpPacket {
        operation: ArpPacket::OP_REQUEST,
        sender_hw_address: mac("11:22:33:44:55:66"),
        sender_proto_address: "10.0.0.9".parse().unwrap(),
        target_hw_address: mac("00:00:00:00:00:00"),
        target_proto_address: "10.0.0.1".parse().unwrap(),
    };

    let port_mac = mac("aa:bb:cc:dd:ee:01");
    let mut frame = BytesMut::new();
    EthernetHdr {
        dst: request.sender_hw_address,
        src: port_mac,
        ethertype: ETHERTYPE_ARP,
    }
    .encode(&mut frame);
    ArpPacket {
        operation: ArpPacket::OP_REPLY,
        sender_hw_address: port_mac,
        sender_proto_address: request.target_proto_address,
        target_hw_address: request.sender_hw_address,
        target_proto_address: request.sender_proto_address,
    }
    .encode(&mut frame);

    assert_eq!(frame.len(), EthernetHdr::LENGTH + ArpPacket::LENGTH);

    let mut buf = &frame[..];
    let ether = EthernetHdr::decode(&mut buf).unwrap();
    assert_eq!(ether.dst, request.sender_hw_address);
    assert_eq!(ether.ethertype, ETHERTYPE_ARP);
    let arp = ArpPacket::decode(&mut buf).unwrap();
    assert_eq!(arp.operation, ArpPacket::OP_REPLY);
    assert_eq!(arp.sender_proto_address, request.target_proto_address);
    assert_eq!(arp.target_proto_address, request.sender_proto_address);
}

#[test]
fn arp_decode_known_bytes() {
    let data: [u8; 28] = [
        0x00, 0x01, 0x08, 0x00, 0x06, 0x04, 0x00, 0x01, 0xd4, 0xb1, 0x08,
        0x4c, 0xbb, 0xf9, 0xc0, 0xa8, 0x64, 0x01, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0xc0, 0xa8, 0x64, 0x10,
    ];
    let mut buf = &data[..];
    let arp = ArpPacket::decode(&mut buf).unwrap();
    assert_eq!(arp.operation, ArpPacket::OP_REQUEST);
    assert_eq!(arp.sender_proto_address, "192.168.100.1".parse::<std::net::Ipv4Addr>().unwrap());
    assert_eq!(arp.target_proto_address, "192.168.100.16".parse::<std::net::Ipv4Addr>().unwrap());
}
