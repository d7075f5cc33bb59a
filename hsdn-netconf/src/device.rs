//
// Copyright (c) The HSDN Project Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::net::Ipv4Addr;

use hsdn_utils::config::{ConfigEntry, reconcile};
use hsdn_utils::ip::slash30_peer;
use hsdn_utils::policy::FlowMatch;
use hsdn_utils::topology::ClassicPort;
use tracing::debug;

use crate::error::Error;
use crate::session::Session;
use crate::yang;

// ACL forwarding actions.
const ACL_DROP: &str = "DROP";
const ACL_ACCEPT: &str = "ACCEPT";

// Discovery state of a managed device.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DeviceState {
    Disconnected,
    ConnectedLldpOff,
    ConnectedLldpOn,
}

// One NETCONF-managed device.
//
// `discover` runs one idempotent step of the connection state machine
// per call; the poller drives it once per tick. All bookkeeping about
// what is installed on the device (the applied list, ACL sequence ids,
// administratively disabled ports) lives here.
#[derive(Debug)]
pub struct Device {
    pub ip_address: Ipv4Addr,
    pub hostname: String,
    user: String,
    password: String,
    session: Option<Session>,
    lldp: bool,
    // Ports in document order, as last discovered.
    pub interfaces: Vec<ClassicPort>,
    // Neighbor system-name → local interface.
    pub neighbors: BTreeMap<String, String>,
    // Canonical configuration entries currently installed.
    applied: Vec<ConfigEntry>,
    // Block-entry bookkeeping: installed count and the sequence id each
    // flow tuple got.
    acl_count: u32,
    acl_sequences: HashMap<String, u32>,
    // Interfaces currently carrying the egress ACL set.
    acl_applied: BTreeSet<String>,
    // Route-forward bookkeeping, same scheme.
    route_forward_count: u32,
    route_forward_sequences: HashMap<String, u32>,
    // Ports shut by a disable entry; the poller must not re-enable them.
    disabled: BTreeSet<String>,
}

// ===== impl Device =====

impl Device {
    pub fn new(
        ip_address: Ipv4Addr,
        hostname: String,
        user: String,
        password: String,
    ) -> Device {
        Device {
            ip_address,
            hostname,
            user,
            password,
            session: None,
            lldp: false,
            interfaces: vec![],
            neighbors: BTreeMap::new(),
            applied: vec![],
            acl_count: 0,
            acl_sequences: HashMap::new(),
            acl_applied: BTreeSet::new(),
            route_forward_count: 0,
            route_forward_sequences: HashMap::new(),
            disabled: BTreeSet::new(),
        }
    }

    pub fn state(&self) -> DeviceState {
        match (&self.session, self.lldp) {
            (None, _) => DeviceState::Disconnected,
            (Some(_), false) => DeviceState::ConnectedLldpOff,
            (Some(_), true) => DeviceState::ConnectedLldpOn,
        }
    }

    pub fn applied(&self) -> &[ConfigEntry] {
        &self.applied
    }

    // Runs one discovery step. Transport failures drop the device back
    // to the disconnected state; the next tick retries.
    pub async fn discover(&mut self) {
        let result = match self.state() {
            DeviceState::Disconnected => self.connect().await,
            DeviceState::ConnectedLldpOff => self.enable_lldp().await,
            DeviceState::ConnectedLldpOn => self.fetch().await,
        };
        if let Err(error) = result {
            error.log();
            if error.is_transport() {
                self.disconnect();
            }
        }
    }

    fn disconnect(&mut self) {
        self.session = None;
        self.lldp = false;
        self.interfaces.clear();
        self.neighbors.clear();
    }

    async fn connect(&mut self) -> Result<(), Error> {
        let session =
            Session::connect(self.ip_address, &self.user, &self.password)
                .await?;
        self.session = Some(session);
        self.load_existing_state().await?;
        Ok(())
    }

    // Load-time housekeeping: flush all policy state the controller owns
    // (static routes, ACL sets, route maps), then seed the applied list
    // with the addresses already configured so reconciliation doesn't
    // fight them. The first interface in document order is the
    // management interface and is skipped.
    async fn load_existing_state(&mut self) -> Result<(), Error> {
        let session = self.session.as_mut().expect("connected");

        session.edit_config(&yang::static_routes_delete_all()).await?;
        session.edit_config(&yang::acl_sets_delete_all()).await?;
        session.edit_config(&yang::route_maps_delete_all()).await?;
        session.commit().await?;

        let reply = session.get(&yang::interfaces_filter()).await?;
        let interfaces = yang::parse_interfaces(&reply)?;
        self.applied = seed_applied(&interfaces);
        self.acl_count = 0;
        self.acl_sequences.clear();
        self.acl_applied.clear();
        self.route_forward_count = 0;
        self.route_forward_sequences.clear();
        self.disabled.clear();

        debug!(host = %self.hostname, applied = self.applied.len(),
            "seeded applied configuration");
        Ok(())
    }

    // Reads the global LLDP flag, enabling it when off.
    async fn enable_lldp(&mut self) -> Result<(), Error> {
        let session = self.session.as_mut().expect("connected");

        let reply = session.get(&yang::lldp_enabled_filter()).await?;
        if !yang::parse_lldp_enabled(&reply)? {
            session.edit_config(&yang::lldp_enable_config()).await?;
            session.commit().await?;
            debug!(host = %self.hostname, "enabled LLDP");
        }
        self.lldp = true;
        Ok(())
    }

    // Fetches interfaces and LLDP neighbors, re-enables interfaces that
    // went down behind the controller's back, and enforces the egress
    // ACL application per interface.
    async fn fetch(&mut self) -> Result<(), Error> {
        let session = self.session.as_mut().expect("connected");

        // A single combined filter gets no reply from some virtual
        // devices, so interfaces and LLDP are fetched separately.
        let reply = session.get(&yang::interfaces_filter()).await?;
        let interfaces = yang::parse_interfaces(&reply)?;
        let reply = session.get(&yang::lldp_filter()).await?;
        let lldp_interfaces = yang::parse_lldp_interfaces(&reply)?;

        let lldp_enabled = lldp_interfaces
            .iter()
            .map(|interface| (interface.name.clone(), interface.enabled))
            .collect::<BTreeMap<_, _>>();

        self.interfaces.clear();
        self.neighbors.clear();
        let mut inactive = vec![];
        for interface in &interfaces {
            let lldp_on =
                lldp_enabled.get(&interface.name).copied().unwrap_or(false);
            if !(interface.enabled && lldp_on) {
                if !self.disabled.contains(&interface.name) {
                    inactive.push(interface.name.clone());
                }
                continue;
            }
            self.interfaces.push(ClassicPort {
                interface_name: interface.name.clone(),
                hw_addr: interface.mac_address.unwrap_or_default(),
            });
        }
        for interface in &lldp_interfaces {
            for neighbor in &interface.neighbors {
                self.neighbors
                    .insert(neighbor.clone(), interface.name.clone());
            }
        }

        // Re-enable inactive interfaces in one batched edit.
        if !inactive.is_empty() {
            debug!(host = %self.hostname, count = inactive.len(),
                "activating interfaces");
            session
                .edit_config(&yang::interfaces_activate_config(&inactive))
                .await?;
            session.commit().await?;
        }

        self.enforce_acl_interfaces().await?;
        Ok(())
    }

    // Applies the device ACL set as egress on every discovered interface
    // while block entries exist, and removes the application when none
    // do.
    async fn enforce_acl_interfaces(&mut self) -> Result<(), Error> {
        let acl_name = format!("ACL_{}", self.hostname);
        let mut apply = vec![];
        let mut remove = vec![];
        for port in &self.interfaces {
            let name = &port.interface_name;
            if self.acl_count > 0 && !self.acl_applied.contains(name) {
                apply.push(name.clone());
            } else if self.acl_count == 0 && self.acl_applied.contains(name) {
                remove.push(name.clone());
            }
        }
        if apply.is_empty() && remove.is_empty() {
            return Ok(());
        }

        // The edits only touch the candidate datastore, so the
        // bookkeeping must not move until the commit lands; a failed
        // cycle is retried in full on the next poll.
        let session = self.session.as_mut().expect("connected");
        for name in &apply {
            session
                .edit_config(&yang::acl_interface_config(
                    name, &acl_name, true,
                ))
                .await?;
        }
        for name in &remove {
            session
                .edit_config(&yang::acl_interface_config(
                    name, &acl_name, false,
                ))
                .await?;
        }
        session.commit().await?;

        self.acl_applied.extend(apply);
        for name in &remove {
            self.acl_applied.remove(name);
        }
        Ok(())
    }

    // Reconciles the desired configuration list against the applied one:
    // stale entries are deconfigured first, in their original insertion
    // order, then new entries are configured. Each successful operation
    // mutates the applied list, so a failure resumes where it left off
    // on the next cycle.
    pub async fn configure_list(&mut self, desired: &[ConfigEntry]) {
        if self.session.is_none() {
            return;
        }
        let (deconfigure, configure) = reconcile(&self.applied, desired);

        for entry in deconfigure {
            match self.configure(&entry, true).await {
                Ok(()) => self.applied.retain(|applied| *applied != entry),
                Err(error) => {
                    error.log();
                    if error.is_transport() {
                        self.disconnect();
                        return;
                    }
                }
            }
        }
        for entry in configure {
            match self.configure(&entry, false).await {
                Ok(()) => self.applied.push(entry),
                Err(error) => {
                    error.log();
                    if error.is_transport() {
                        self.disconnect();
                        return;
                    }
                }
            }
        }
    }

    async fn configure(
        &mut self,
        entry: &ConfigEntry,
        deconf: bool,
    ) -> Result<(), Error> {
        match entry {
            ConfigEntry::Address { port, address } => {
                let config = if deconf {
                    yang::address_delete(port)
                } else {
                    yang::address_config(port, *address)
                };
                self.edit_and_commit(&config).await?;
            }
            ConfigEntry::Route {
                destination,
                exit_port,
                next_hop,
            } => {
                let config = if deconf {
                    yang::static_route_delete(*destination)
                } else {
                    yang::static_route_config(
                        *destination,
                        exit_port,
                        *next_hop,
                    )
                };
                self.edit_and_commit(&config).await?;
            }
            ConfigEntry::Block { flow } => {
                self.configure_block(flow, deconf).await?;
            }
            ConfigEntry::RouteForward { flow, exit_port } => {
                self.configure_route_forward(flow, exit_port, deconf).await?;
            }
            ConfigEntry::Disable { port } => {
                self.configure_disable(port, deconf).await?;
            }
        }
        debug!(host = %self.hostname, %entry, %deconf, "configured");
        Ok(())
    }

    async fn configure_block(
        &mut self,
        flow: &FlowMatch,
        deconf: bool,
    ) -> Result<(), Error> {
        let acl_name = format!("ACL_{}", self.hostname);
        let key = flow.to_string();

        if deconf {
            // The sequence entry is dropped only once the delete lands,
            // so a failed cycle can retry with the same id.
            let sequence_id =
                self.acl_sequences.get(&key).copied().ok_or_else(|| {
                    Error::StateConflict(format!(
                        "no ACL sequence recorded for: {key}"
                    ))
                })?;
            let config = yang::acl_entry_delete(&acl_name, sequence_id);
            self.edit_and_commit(&config).await?;
            self.acl_sequences.remove(&key);
            self.acl_count -= 1;
        } else {
            let sequence_id = (self.acl_count * 10) + 10;
            let config =
                yang::acl_entry_config(&acl_name, sequence_id, flow, ACL_DROP);
            self.edit_and_commit(&config).await?;
            self.acl_count += 1;
            self.acl_sequences.insert(key, sequence_id);
        }
        Ok(())
    }

    async fn configure_route_forward(
        &mut self,
        flow: &FlowMatch,
        exit_port: &str,
        deconf: bool,
    ) -> Result<(), Error> {
        let map_name = format!("MAP_{}", self.hostname);
        let key = format!("{flow} {exit_port}");

        if deconf {
            // The sequence entry is dropped only once both deletes land:
            // a failure in either edit leaves the bookkeeping in place so
            // the next cycle retries with the same id.
            let sequence_id = self
                .route_forward_sequences
                .get(&key)
                .copied()
                .ok_or_else(|| {
                    Error::StateConflict(format!(
                        "no route-map sequence recorded for: {key}"
                    ))
                })?;
            let acl_name =
                format!("ACL_route-f_{}_{}", self.hostname, sequence_id);
            let config = yang::route_map_delete(&map_name, sequence_id);
            self.edit_and_commit(&config).await?;
            let config = yang::acl_entry_delete(&acl_name, sequence_id);
            self.edit_and_commit(&config).await?;
            self.route_forward_sequences.remove(&key);
            self.route_forward_count -= 1;
        } else {
            let next_hop = route_forward_next_hop(&self.applied, exit_port)?;
            let sequence_id = (self.route_forward_count * 10) + 10;
            let acl_name =
                format!("ACL_route-f_{}_{}", self.hostname, sequence_id);

            let config = yang::acl_entry_config(
                &acl_name,
                sequence_id,
                flow,
                ACL_ACCEPT,
            );
            self.edit_and_commit(&config).await?;
            let config = yang::route_map_config(
                &map_name,
                sequence_id,
                &acl_name,
                next_hop,
            );
            self.edit_and_commit(&config).await?;

            self.route_forward_count += 1;
            self.route_forward_sequences.insert(key, sequence_id);
        }
        Ok(())
    }

    async fn configure_disable(
        &mut self,
        port: &str,
        deconf: bool,
    ) -> Result<(), Error> {
        if deconf {
            self.edit_and_commit(&yang::interface_enabled_config(port, true))
                .await?;
            self.disabled.remove(port);
        } else {
            let currently_enabled = self
                .interfaces
                .iter()
                .any(|interface| interface.interface_name == port);
            if currently_enabled {
                self.edit_and_commit(&yang::interface_enabled_config(
                    port, false,
                ))
                .await?;
            }
            self.disabled.insert(port.to_string());
        }
        Ok(())
    }

    async fn edit_and_commit(&mut self, config: &str) -> Result<(), Error> {
        let session = self.session.as_mut().ok_or_else(|| {
            Error::StateConflict("device is disconnected".to_string())
        })?;
        session.edit_config(config).await?;
        session.commit().await?;
        Ok(())
    }
}

// ===== global functions =====

// Seeds the applied list from the addresses already configured on the
// device. The first interface in document order is the management
// interface and must be left alone.
pub fn seed_applied(interfaces: &[yang::InterfaceInfo]) -> Vec<ConfigEntry> {
    interfaces
        .iter()
        .skip(1)
        .flat_map(|interface| {
            interface.addresses.iter().map(|address| {
                ConfigEntry::Address {
                    port: interface.name.clone(),
                    address: *address,
                }
            })
        })
        .collect()
}

// Derives the policy-based-forwarding next hop from the exit port's
// configured address: the other host of its /30. Any other prefix is a
// validation failure.
pub fn route_forward_next_hop(
    applied: &[ConfigEntry],
    exit_port: &str,
) -> Result<Ipv4Addr, Error> {
    let address = applied
        .iter()
        .find_map(|entry| match entry {
            ConfigEntry::Address { port, address } if port == exit_port => {
                Some(*address)
            }
            _ => None,
        })
        .ok_or_else(|| {
            Error::ValidationError(format!(
                "no address configured on exit port {exit_port}"
            ))
        })?;
    slash30_peer(address).ok_or_else(|| {
        Error::ValidationError(format!(
            "exit port {exit_port} address {address} is not a usable /30"
        ))
    })
}
