//
// Copyright (c) The HSDN Project Contributors
//
// SPDX-License-Identifier: MIT
//

pub mod error;
pub mod labels;
pub mod packet;
pub mod session;

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use bytes::BytesMut;
use hsdn_utils::config::{ConfigEntry, ConfigMap, reconcile};
use hsdn_utils::ibus::{IbusChannelsTx, IbusMsg, IbusReceiver};
use hsdn_utils::ip::network_address;
use hsdn_utils::mac_addr::MacAddr;
use hsdn_utils::topology::{LldpEntry, SdnPort, SdnSnapshot};
use ipnetwork::Ipv4Network;
use tokio::sync::mpsc;
use tracing::{Instrument, debug, debug_span, error, warn};

use crate::error::Error;
use crate::labels::LabelMap;
use crate::packet::ether::{
    ArpPacket, ETHERTYPE_ARP, ETHERTYPE_IPV4, ETHERTYPE_LLDP, EthernetHdr,
};
use crate::packet::lldp::LldpPdu;
use crate::packet::{
    Action, FlowMod, FlowModCommand, FlowRemovedReason, Instruction, Match,
    MatchField, Message, OFP_NO_BUFFER, OFPFF_SEND_FLOW_REM, OFPG_ANY,
    OFPP_ANY, OFPP_CONTROLLER, OFPP_LOCAL,
};
use crate::session::{SessionId, SessionMsg, SessionTx};

// LLDP emission periods. The first cycle fires after one second so a
// fresh switch shows up quickly; steady state re-triggers every fifteen.
const LLDP_FIRST_TIMEOUT: u16 = 1;
const LLDP_TIMEOUT: u16 = 15;
// Priority of the LLDP-to-controller flow.
const LLDP_FLOW_PRIORITY: u16 = 0xffff;
// Priority of the dummy self-retrigger flow.
const LLDP_DUMMY_PRIORITY: u16 = 10;
// Aging passes closer together than this are coalesced.
const AGING_MIN_INTERVAL: Duration = Duration::from_secs(1);

// Runtime state of one connected datapath.
#[derive(Debug)]
struct Datapath {
    session_id: SessionId,
    datapath_id: u64,
    tx: SessionTx,
    ports: Vec<SdnPort>,
    lldp: BTreeMap<String, LldpEntry>,
}

#[derive(Debug)]
pub struct Master {
    // Internal bus Tx channel.
    ibus_tx: IbusChannelsTx,
    // Persistent datapath labels.
    labels: LabelMap,
    // Connected sessions, including those that haven't completed the
    // handshake yet.
    sessions: HashMap<SessionId, SessionTx>,
    // Datapath runtime state, keyed by label.
    datapaths: HashMap<String, Datapath>,
    // Session → label reverse index, populated after the handshake.
    session_labels: HashMap<SessionId, String>,
    // Applied configuration entries, keyed by label. Retained across
    // disconnects so a reconnecting datapath resumes its identity.
    configurations: HashMap<String, Vec<ConfigEntry>>,
    // Last LLDP aging pass.
    last_aging: Instant,
}

// ===== impl Master =====

impl Master {
    async fn run(
        &mut self,
        mut ibus_rx: IbusReceiver,
        mut session_rx: mpsc::UnboundedReceiver<SessionMsg>,
    ) {
        loop {
            tokio::select! {
                Some(msg) = ibus_rx.recv() => {
                    self.process_ibus_msg(msg);
                }
                Some(msg) = session_rx.recv() => {
                    self.process_session_msg(msg);
                }
                else => break,
            }
        }
    }

    fn process_ibus_msg(&mut self, msg: IbusMsg) {
        match msg {
            IbusMsg::SdnConfigurations(configurations) => {
                self.configure_datapaths(&configurations);
            }
            IbusMsg::SdnDeviceCommand(words) => {
                self.process_device_command(&words);
            }
            _ => (),
        }
    }

    fn process_session_msg(&mut self, msg: SessionMsg) {
        match msg {
            SessionMsg::Connected {
                session_id,
                addr: _,
                tx,
            } => {
                tx.send(&Message::Hello);
                tx.send(&Message::FeaturesRequest);
                self.sessions.insert(session_id, tx);
            }
            SessionMsg::Message {
                session_id,
                xid,
                msg,
            } => {
                self.process_message(session_id, xid, msg);
            }
            SessionMsg::Disconnected { session_id } => {
                self.sessions.remove(&session_id);
                // The persistent label is retained so a reconnect
                // resumes the same identity.
                if let Some(label) = self.session_labels.remove(&session_id)
                    && let Some(dp) = self.datapaths.remove(&label)
                {
                    debug!(datapath_id = %dp.datapath_id, %label,
                        "datapath disconnected");
                }
            }
        }
    }

    fn process_message(
        &mut self,
        session_id: SessionId,
        xid: u32,
        msg: Message,
    ) {
        match msg {
            Message::Hello => (),
            Message::EchoRequest { data } => {
                if let Some(tx) = self.sessions.get(&session_id) {
                    tx.send_xid(&Message::EchoReply { data }, xid);
                }
            }
            Message::FeaturesReply { datapath_id, .. } => {
                self.datapath_connected(session_id, datapath_id);
            }
            Message::PortDescReply { ports } => {
                self.ports_discovered(session_id, ports);
            }
            Message::FlowRemoved { reason, .. } => {
                if reason == FlowRemovedReason::HardTimeout {
                    if let Some(label) =
                        self.session_labels.get(&session_id).cloned()
                    {
                        self.send_lldp_packets(&label);
                        self.start_lldp(&label, LLDP_TIMEOUT);
                    }
                }
            }
            Message::PacketIn { mtch, data, .. } => {
                if let Err(error) =
                    self.process_packet_in(session_id, &mtch, &data)
                {
                    error.log();
                }
            }
            Message::Error {
                err_type, code, ..
            } => {
                debug!(%session_id, %err_type, %code, "received error message");
            }
            _ => (),
        }
    }

    // A features reply completed the handshake: resolve the label and
    // kick off port discovery and the LLDP loop.
    fn datapath_connected(&mut self, session_id: SessionId, datapath_id: u64) {
        let Some(tx) = self.sessions.get(&session_id) else {
            return;
        };
        let label = match self.labels.get(datapath_id) {
            Some(label) => {
                let label = label.to_string();
                debug!(%datapath_id, %label, "found existing SDN device");
                label
            }
            None => match self.labels.allocate(datapath_id) {
                Ok(label) => {
                    debug!(%datapath_id, %label, "found new SDN device");
                    label
                }
                Err(error) => {
                    Error::LabelStore(error).log();
                    return;
                }
            },
        };

        self.session_labels.insert(session_id, label.clone());
        self.datapaths.insert(
            label.clone(),
            Datapath {
                session_id,
                datapath_id,
                tx: tx.clone(),
                ports: vec![],
                lldp: BTreeMap::new(),
            },
        );

        // Request switch ports; LLDP discovery starts on the reply.
        tx.send(&Message::PortDescRequest);

        // Install flow to send received LLDP packets to the controller.
        tx.send(&Message::FlowMod(FlowMod {
            priority: LLDP_FLOW_PRIORITY,
            mtch: Match::new(vec![MatchField::EthType(ETHERTYPE_LLDP)]),
            instructions: vec![Instruction::ApplyActions(vec![
                Action::Output(OFPP_CONTROLLER),
            ])],
            ..Default::default()
        }));

        debug!(%datapath_id, %label, "datapath connected");
    }

    fn ports_discovered(
        &mut self,
        session_id: SessionId,
        ports: Vec<packet::PortDesc>,
    ) {
        let Some(label) = self.session_labels.get(&session_id).cloned() else {
            return;
        };
        if let Some(dp) = self.datapaths.get_mut(&label) {
            dp.ports = ports
                .into_iter()
                .filter(|port| port.port_no != OFPP_LOCAL)
                .map(|port| SdnPort {
                    port_no: port.port_no,
                    hw_addr: port.hw_addr,
                })
                .collect();
            dp.lldp.clear();
            debug!(%label, ports = dp.ports.len(), "datapath ports discovered");

            self.start_lldp(&label, LLDP_FIRST_TIMEOUT);
        }
    }

    // Installs the dummy self-retrigger flow: it expires after `timeout`
    // seconds and the resulting flow-removed event emits the next round
    // of LLDP frames. Aging piggybacks on the same cadence.
    fn start_lldp(&mut self, label: &str, timeout: u16) {
        if let Some(dp) = self.datapaths.get(label) {
            dp.tx.send(&Message::FlowMod(FlowMod {
                priority: LLDP_DUMMY_PRIORITY,
                hard_timeout: timeout,
                flags: OFPFF_SEND_FLOW_REM,
                instructions: vec![Instruction::ApplyActions(vec![])],
                ..Default::default()
            }));
            debug!(%label, %timeout, "starting LLDP");
        }
        self.update_lldp_database();
    }

    // Emits one crafted LLDP frame per switch port.
    fn send_lldp_packets(&self, label: &str) {
        let Some(dp) = self.datapaths.get(label) else {
            return;
        };
        for port in &dp.ports {
            let mut frame = BytesMut::with_capacity(128);
            EthernetHdr {
                dst: MacAddr::LLDP_MULTICAST,
                src: port.hw_addr,
                ethertype: ETHERTYPE_LLDP,
            }
            .encode(&mut frame);
            LldpPdu::new(port.hw_addr, port.port_no, label).encode(&mut frame);

            dp.tx.send(&Message::PacketOut {
                buffer_id: OFP_NO_BUFFER,
                in_port: OFPP_CONTROLLER,
                actions: vec![Action::Output(port.port_no)],
                data: frame.freeze(),
            });
        }
    }

    // Ages the LLDP database and publishes the SDN topology. Passes
    // closer together than one second are coalesced, publication
    // included.
    fn update_lldp_database(&mut self) {
        let elapsed = self.last_aging.elapsed();
        if elapsed < AGING_MIN_INTERVAL {
            return;
        }
        self.last_aging = Instant::now();
        let elapsed = elapsed.as_secs_f64();

        for dp in self.datapaths.values_mut() {
            dp.lldp.retain(|system_name, entry| {
                entry.ttl -= elapsed;
                if entry.ttl <= 0.0 {
                    debug!(%system_name, "LLDP entry expired");
                    false
                } else {
                    true
                }
            });
        }

        self.send_topology();
    }

    fn send_topology(&self) {
        let mut snapshot = SdnSnapshot::default();
        for (label, dp) in &self.datapaths {
            snapshot.ports.insert(label.clone(), dp.ports.clone());
            snapshot.neighbors.insert(label.clone(), dp.lldp.clone());
        }
        self.ibus_tx.sdn_topology_upd(snapshot);
    }

    fn process_packet_in(
        &mut self,
        session_id: SessionId,
        mtch: &Match,
        data: &[u8],
    ) -> Result<(), Error> {
        let Some(label) = self.session_labels.get(&session_id).cloned() else {
            return Ok(());
        };
        let Some(in_port) = mtch.in_port() else {
            return Ok(());
        };

        let mut buf = data;
        let ether = EthernetHdr::decode(&mut buf)?;
        match ether.ethertype {
            ETHERTYPE_LLDP => {
                let pdu = LldpPdu::decode(buf)?;
                let Some(system_name) = pdu.system_name else {
                    return Ok(());
                };
                debug!(%label, %in_port, %system_name, ttl = %pdu.ttl,
                    "LLDP packet received");
                if let Some(dp) = self.datapaths.get_mut(&label) {
                    dp.lldp.insert(
                        system_name,
                        LldpEntry {
                            port: in_port,
                            ttl: pdu.ttl as f64,
                        },
                    );
                }
            }
            ETHERTYPE_ARP => {
                let arp = ArpPacket::decode(&mut buf)?;
                self.send_arp_reply(&label, in_port, &ether, &arp);
            }
            ethertype => {
                debug!(%label, %in_port, %ethertype, "packet in received");
            }
        }
        Ok(())
    }

    // ARP responder: answers requests for addresses configured on the
    // ingress port with the port's own MAC.
    fn send_arp_reply(
        &self,
        label: &str,
        in_port: u32,
        ether: &EthernetHdr,
        arp: &ArpPacket,
    ) {
        let Some(dp) = self.datapaths.get(label) else {
            return;
        };
        let Some(hw_addr) = dp
            .ports
            .iter()
            .find(|port| port.port_no == in_port)
            .map(|port| port.hw_addr)
        else {
            return;
        };

        let mut frame = BytesMut::with_capacity(64);
        EthernetHdr {
            dst: ether.src,
            src: hw_addr,
            ethertype: ETHERTYPE_ARP,
        }
        .encode(&mut frame);
        ArpPacket {
            operation: ArpPacket::OP_REPLY,
            sender_hw_address: hw_addr,
            sender_proto_address: arp.target_proto_address,
            target_hw_address: arp.sender_hw_address,
            target_proto_address: arp.sender_proto_address,
        }
        .encode(&mut frame);

        dp.tx.send(&Message::PacketOut {
            buffer_id: OFP_NO_BUFFER,
            in_port: OFPP_CONTROLLER,
            actions: vec![Action::Output(in_port)],
            data: frame.freeze(),
        });
        debug!(%label, %in_port, "ARP reply sent");
    }

    // Reconciles the desired configurations against the applied lists of
    // the connected datapaths.
    fn configure_datapaths(&mut self, configurations: &ConfigMap) {
        for (label, desired) in configurations {
            if !self.datapaths.contains_key(label) {
                continue;
            }
            let applied =
                self.configurations.get(label).cloned().unwrap_or_default();
            let (deconfigure, configure) = reconcile(&applied, desired);

            for entry in deconfigure {
                match self.configure(label, &entry, true) {
                    Ok(()) => {
                        let applied =
                            self.configurations.entry(label.clone()).or_default();
                        applied.retain(|applied| *applied != entry);
                    }
                    Err(error) => error.log(),
                }
            }
            for entry in configure {
                match self.configure(label, &entry, false) {
                    Ok(()) => {
                        self.configurations
                            .entry(label.clone())
                            .or_default()
                            .push(entry);
                    }
                    Err(error) => error.log(),
                }
            }
        }
    }

    fn configure(
        &self,
        label: &str,
        entry: &ConfigEntry,
        deconf: bool,
    ) -> Result<(), Error> {
        match entry {
            ConfigEntry::Address { port, address } => {
                let port_no = port
                    .parse::<u32>()
                    .map_err(|_| Error::InvalidPort(port.clone()))?;
                self.configure_address(label, port_no, *address, deconf)
            }
            ConfigEntry::Route {
                destination,
                exit_port,
                ..
            } => {
                let port_no = exit_port
                    .parse::<u32>()
                    .map_err(|_| Error::InvalidPort(exit_port.clone()))?;
                self.configure_route(label, *destination, port_no, deconf)
            }
            _ => Err(Error::UnsupportedConfiguration(entry.to_string())),
        }
    }

    // Address configuration: steer ARP requests for the address to the
    // controller, and route the address's network out the port.
    fn configure_address(
        &self,
        label: &str,
        port_no: u32,
        address: Ipv4Network,
        deconf: bool,
    ) -> Result<(), Error> {
        let dp = self
            .datapaths
            .get(label)
            .ok_or_else(|| Error::UnknownDatapath(label.to_string()))?;

        let mtch = Match::new(vec![
            MatchField::EthType(ETHERTYPE_ARP),
            MatchField::InPort(port_no),
            MatchField::ArpTpa(address.ip()),
            MatchField::ArpOp(ArpPacket::OP_REQUEST),
        ]);
        let instructions = vec![Instruction::ApplyActions(vec![
            Action::Output(OFPP_CONTROLLER),
        ])];
        dp.tx.send(&Message::FlowMod(flow_mod(mtch, instructions, deconf)));

        self.configure_route(label, address, port_no, deconf)?;

        debug!(%label, %port_no, %address, %deconf, "configured address");
        Ok(())
    }

    // Route configuration: rewrite the destination MAC to broadcast (no
    // ARP on the far side) and output the port.
    fn configure_route(
        &self,
        label: &str,
        destination: Ipv4Network,
        port_no: u32,
        deconf: bool,
    ) -> Result<(), Error> {
        let dp = self
            .datapaths
            .get(label)
            .ok_or_else(|| Error::UnknownDatapath(label.to_string()))?;

        let network = network_address(destination.ip(), destination.prefix());
        let destination = Ipv4Network::new(network, destination.prefix())
            .expect("prefix was validated on parse");

        let mtch = Match::new(vec![
            MatchField::EthType(ETHERTYPE_IPV4),
            MatchField::Ipv4Dst(destination),
        ]);
        let instructions = vec![Instruction::ApplyActions(vec![
            Action::SetField(MatchField::EthDst(MacAddr::BROADCAST)),
            Action::Output(port_no),
        ])];
        dp.tx.send(&Message::FlowMod(flow_mod(mtch, instructions, deconf)));

        debug!(%label, %port_no, %destination, %deconf, "configured route");
        Ok(())
    }

    // `sdn-device edit <new> old <old>`: rename a datapath label, in
    // memory and in the label file.
    fn process_device_command(&mut self, words: &[String]) {
        match words.first().map(String::as_str) {
            Some("edit") => {
                let Some(separator) = words.iter().position(|word| word == "old")
                else {
                    warn!(?words, "malformed sdn-device command");
                    return;
                };
                let new = words[1..separator].join(" ");
                let old = words[separator + 1..].join(" ");

                match self.labels.rename(&old, &new) {
                    Ok(Some(datapath_id)) => {
                        if let Some(mut dp) = self.datapaths.remove(&old) {
                            self.session_labels
                                .insert(dp.session_id, new.clone());
                            dp.datapath_id = datapath_id;
                            self.datapaths.insert(new.clone(), dp);
                        }
                        if let Some(applied) = self.configurations.remove(&old)
                        {
                            self.configurations.insert(new.clone(), applied);
                        }
                        debug!(%old, %new, "renamed SDN device");
                        self.ibus_tx.device_rename(old, new);
                    }
                    Ok(None) => {
                        warn!(%old, "unknown SDN device label");
                    }
                    Err(error) => Error::LabelStore(error).log(),
                }
            }
            _ => warn!(?words, "unsupported sdn-device command"),
        }
    }
}

// ===== helper functions =====

fn flow_mod(
    mtch: Match,
    instructions: Vec<Instruction>,
    deconf: bool,
) -> FlowMod {
    if deconf {
        FlowMod {
            command: FlowModCommand::Delete,
            out_port: OFPP_ANY,
            out_group: OFPG_ANY,
            mtch,
            instructions,
            ..Default::default()
        }
    } else {
        FlowMod {
            mtch,
            instructions,
            ..Default::default()
        }
    }
}

// ===== global functions =====

pub fn start(
    ibus_tx: IbusChannelsTx,
    ibus_rx: IbusReceiver,
    listen_addr: String,
    label_path: PathBuf,
) {
    let (session_tx, session_rx) = mpsc::unbounded_channel();

    tokio::spawn(
        async move {
            let labels = LabelMap::load(label_path);

            // Accept switch connections.
            tokio::spawn(
                async move {
                    if let Err(error) =
                        session::listen(listen_addr, session_tx).await
                    {
                        error!(%error, "failed to bind controller socket");
                    }
                }
                .in_current_span(),
            );

            let mut master = Master {
                ibus_tx,
                labels,
                sessions: HashMap::new(),
                datapaths: HashMap::new(),
                session_labels: HashMap::new(),
                configurations: HashMap::new(),
                last_aging: Instant::now(),
            };

            // Run task main loop.
            master.run(ibus_rx, session_rx).await;
        }
        .instrument(debug_span!("openflow")),
    );
}
