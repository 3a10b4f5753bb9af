//! Network daemon client.
//!
//! This module provides the `NetworkDaemon` trait and the `DockerCli`
//! implementation, which drives the `docker` command-line client through a
//! [`CommandRunner`].

use async_trait::async_trait;
use tracing::{debug, info};

use crate::runner::{render_command, CommandOutput, CommandRunner, ProcessRunner};
use crate::types::{parse_inspect_output, CreateNetwork, DaemonConfig, NetworkRow, ObservedNetwork};
use crate::{DaemonError, Result};

/// The `NetworkDaemon` trait defines every daemon operation docknet uses.
#[async_trait]
pub trait NetworkDaemon: Send + Sync {
    /// Check whether the daemon is reachable.
    async fn is_available(&self) -> bool;

    /// List networks, optionally restricted by a daemon filter expression.
    ///
    /// # Errors
    ///
    /// Returns an error if the list command fails.
    async fn list_networks(&self, filter: Option<&str>) -> Result<Vec<NetworkRow>>;

    /// Inspect several networks (by ID or name) in one call.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails; the daemon fails the whole call
    /// when any one reference is unknown.
    async fn inspect_networks(&self, refs: &[String]) -> Result<Vec<ObservedNetwork>>;

    /// Create a network.
    ///
    /// # Errors
    ///
    /// Returns `DaemonError::CommandFailed` carrying the rendered command if
    /// creation fails.
    async fn create_network(&self, request: &CreateNetwork) -> Result<()>;

    /// Remove a network.
    ///
    /// # Errors
    ///
    /// Returns an error if removal fails.
    async fn remove_network(&self, name: &str) -> Result<()>;

    /// Connect a container to a network.
    ///
    /// # Errors
    ///
    /// Returns an error if the connect call fails.
    async fn connect(&self, network: &str, endpoint: &str) -> Result<()>;

    /// Disconnect a container from a network.
    ///
    /// # Errors
    ///
    /// Returns an error if the disconnect call fails.
    async fn disconnect(&self, network: &str, endpoint: &str, force: bool) -> Result<()>;

    /// Force-remove a container.
    ///
    /// # Errors
    ///
    /// Returns an error if removal fails.
    async fn remove_container(&self, container: &str) -> Result<()>;
}

/// Daemon client backed by the `docker` CLI.
pub struct DockerCli<R = ProcessRunner> {
    runner: R,
    config: DaemonConfig,
}

impl DockerCli<ProcessRunner> {
    /// Create a client that runs real processes.
    #[must_use]
    pub fn new(config: DaemonConfig) -> Self {
        Self::with_runner(ProcessRunner, config)
    }
}

impl<R: CommandRunner> DockerCli<R> {
    /// Create a client with a custom command runner.
    #[must_use]
    pub fn with_runner(runner: R, config: DaemonConfig) -> Self {
        Self { runner, config }
    }

    /// Get a reference to the daemon config.
    #[must_use]
    pub fn config(&self) -> &DaemonConfig {
        &self.config
    }

    /// Run a daemon command, returning its output only if it succeeded.
    async fn run_checked(&self, args: Vec<String>) -> Result<CommandOutput> {
        let output = self.runner.run(&self.config.docker_bin, &args).await?;
        if output.success {
            Ok(output)
        } else {
            Err(DaemonError::CommandFailed {
                command: render_command(&self.config.docker_bin, &args),
                code: output.code,
                stderr: output.stderr,
            })
        }
    }
}

fn argv(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| (*s).to_string()).collect()
}

#[async_trait]
impl<R: CommandRunner> NetworkDaemon for DockerCli<R> {
    async fn is_available(&self) -> bool {
        match self.runner.run(&self.config.docker_bin, &argv(&["info"])).await {
            Ok(output) => output.success,
            Err(e) => {
                debug!(error = %e, "Daemon probe failed");
                false
            }
        }
    }

    async fn list_networks(&self, filter: Option<&str>) -> Result<Vec<NetworkRow>> {
        let mut args = argv(&["network", "ls"]);
        if let Some(filter) = filter {
            args.push("--filter".to_string());
            args.push(filter.to_string());
        }
        args.push("--format".to_string());
        args.push(NetworkRow::FORMAT.to_string());

        let output = self.run_checked(args).await?;
        Ok(output.stdout.lines().filter_map(NetworkRow::parse_line).collect())
    }

    async fn inspect_networks(&self, refs: &[String]) -> Result<Vec<ObservedNetwork>> {
        if refs.is_empty() {
            return Ok(Vec::new());
        }
        let mut args = argv(&["network", "inspect"]);
        args.extend(refs.iter().cloned());

        let output = self.run_checked(args).await?;
        Ok(parse_inspect_output(&output.stdout)?)
    }

    async fn create_network(&self, request: &CreateNetwork) -> Result<()> {
        self.run_checked(request.to_args()).await?;
        info!(network = %request.name, driver = %request.driver, "Created network");
        Ok(())
    }

    async fn remove_network(&self, name: &str) -> Result<()> {
        self.run_checked(argv(&["network", "rm", name])).await?;
        info!(network = %name, "Removed network");
        Ok(())
    }

    async fn connect(&self, network: &str, endpoint: &str) -> Result<()> {
        self.run_checked(argv(&["network", "connect", network, endpoint]))
            .await?;
        debug!(network = %network, endpoint = %endpoint, "Connected endpoint");
        Ok(())
    }

    async fn disconnect(&self, network: &str, endpoint: &str, force: bool) -> Result<()> {
        let mut args = argv(&["network", "disconnect"]);
        if force {
            args.push("--force".to_string());
        }
        args.push(network.to_string());
        args.push(endpoint.to_string());
        self.run_checked(args).await?;
        debug!(network = %network, endpoint = %endpoint, "Disconnected endpoint");
        Ok(())
    }

    async fn remove_container(&self, container: &str) -> Result<()> {
        self.run_checked(argv(&["rm", "-f", container])).await?;
        info!(container = %container, "Removed container");
        Ok(())
    }
}

/// Render the create command for `request` as it would be run by `program`.
#[must_use]
pub fn render_create(program: &str, request: &CreateNetwork) -> String {
    render_command(program, &request.to_args())
}

/// Mock daemon for testing.
#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    use super::*;
    use crate::types::{AttachedEndpoint, IpamConfig};
    use docknet_core::cidr;
    use parking_lot::Mutex;
    use std::collections::{BTreeMap, HashMap, HashSet};

    /// One call received by the mock, in order.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum DaemonCall {
        /// `info`
        Probe,
        /// `network ls`
        List(Option<String>),
        /// `network inspect`
        Inspect(Vec<String>),
        /// `network create`
        Create(String),
        /// `network rm`
        Remove(String),
        /// `network connect`
        Connect {
            /// Network name.
            network: String,
            /// Endpoint name.
            endpoint: String,
        },
        /// `network disconnect`
        Disconnect {
            /// Network name.
            network: String,
            /// Endpoint name.
            endpoint: String,
            /// Whether `--force` was passed.
            force: bool,
        },
        /// `rm -f`
        RemoveContainer(String),
    }

    impl DaemonCall {
        /// True for calls that change daemon state.
        #[must_use]
        pub const fn is_mutation(&self) -> bool {
            !matches!(self, Self::Probe | Self::List(_) | Self::Inspect(_))
        }
    }

    #[derive(Clone)]
    struct MockNetwork {
        id: String,
        driver: String,
        ipam: Vec<IpamConfig>,
        labels: HashMap<String, String>,
        endpoints: BTreeMap<String, Option<String>>,
        ipv6: bool,
        attachable: bool,
        options: HashMap<String, String>,
    }

    #[derive(Default)]
    struct Failures {
        create: HashSet<String>,
        remove: HashSet<String>,
        connect: HashSet<(String, String)>,
        disconnect: HashSet<(String, String)>,
        inspect: HashSet<String>,
        list: bool,
    }

    #[derive(Default)]
    struct State {
        networks: BTreeMap<String, MockNetwork>,
        containers: HashSet<String>,
        next_id: u64,
        calls: Vec<DaemonCall>,
        failures: Failures,
        unavailable: bool,
    }

    /// A mock daemon that keeps networks in memory.
    #[derive(Default)]
    pub struct MockDaemon {
        state: Mutex<State>,
    }

    fn failed(command: String) -> DaemonError {
        DaemonError::CommandFailed {
            command,
            code: Some(1),
            stderr: "injected failure".to_string(),
        }
    }

    impl MockDaemon {
        /// Create a new, empty mock daemon.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Add a network with one subnet and the given labels.
        pub fn add_network(&self, name: &str, subnet: Option<&str>, labels: &[(&str, &str)]) {
            let ipam = subnet.map(IpamConfig::subnet).into_iter().collect();
            self.insert(
                name,
                "bridge",
                ipam,
                labels
                    .iter()
                    .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                    .collect(),
            );
        }

        /// Add a network with full IPAM configuration.
        pub fn add_network_with_ipam(
            &self,
            name: &str,
            ipam: Vec<IpamConfig>,
            labels: &[(&str, &str)],
        ) {
            self.insert(
                name,
                "bridge",
                ipam,
                labels
                    .iter()
                    .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                    .collect(),
            );
        }

        fn insert(
            &self,
            name: &str,
            driver: &str,
            ipam: Vec<IpamConfig>,
            labels: HashMap<String, String>,
        ) {
            let mut state = self.state.lock();
            state.next_id += 1;
            let id = format!("{:012x}{:052x}", state.next_id, 0);
            state.networks.insert(
                name.to_string(),
                MockNetwork {
                    id,
                    driver: driver.to_string(),
                    ipam,
                    labels,
                    endpoints: BTreeMap::new(),
                    ipv6: false,
                    attachable: false,
                    options: HashMap::new(),
                },
            );
        }

        /// Attach a container to a network directly, bypassing the call log.
        pub fn attach(&self, network: &str, endpoint: &str) {
            let mut state = self.state.lock();
            state.containers.insert(endpoint.to_string());
            if let Some(net) = state.networks.get_mut(network) {
                let ip = next_address(net);
                net.endpoints.insert(endpoint.to_string(), ip);
            }
        }

        /// Make the daemon unreachable.
        pub fn set_unavailable(&self, unavailable: bool) {
            self.state.lock().unavailable = unavailable;
        }

        /// Fail every create of `network`.
        pub fn fail_create(&self, network: &str) {
            self.state.lock().failures.create.insert(network.to_string());
        }

        /// Fail every remove of `network`.
        pub fn fail_remove(&self, network: &str) {
            self.state.lock().failures.remove.insert(network.to_string());
        }

        /// Fail connecting `endpoint` to `network`.
        pub fn fail_connect(&self, network: &str, endpoint: &str) {
            self.state
                .lock()
                .failures
                .connect
                .insert((network.to_string(), endpoint.to_string()));
        }

        /// Fail disconnecting `endpoint` from `network`.
        pub fn fail_disconnect(&self, network: &str, endpoint: &str) {
            self.state
                .lock()
                .failures
                .disconnect
                .insert((network.to_string(), endpoint.to_string()));
        }

        /// Fail any inspect call that includes `reference`.
        pub fn fail_inspect(&self, reference: &str) {
            self.state
                .lock()
                .failures
                .inspect
                .insert(reference.to_string());
        }

        /// Fail every list call.
        pub fn fail_list(&self) {
            self.state.lock().failures.list = true;
        }

        /// Whether a network with this name exists.
        #[must_use]
        pub fn has_network(&self, name: &str) -> bool {
            self.state.lock().networks.contains_key(name)
        }

        /// Number of networks.
        #[must_use]
        pub fn network_count(&self) -> usize {
            self.state.lock().networks.len()
        }

        /// Endpoints attached to a network, in name order.
        #[must_use]
        pub fn endpoints_of(&self, network: &str) -> Vec<String> {
            self.state
                .lock()
                .networks
                .get(network)
                .map(|n| n.endpoints.keys().cloned().collect())
                .unwrap_or_default()
        }

        /// Subnets of a network.
        #[must_use]
        pub fn subnets_of(&self, network: &str) -> Vec<String> {
            self.state
                .lock()
                .networks
                .get(network)
                .map(|n| n.ipam.iter().filter_map(|c| c.subnet.clone()).collect())
                .unwrap_or_default()
        }

        /// IPAM blocks of a network.
        #[must_use]
        pub fn ipam_of(&self, network: &str) -> Vec<IpamConfig> {
            self.state
                .lock()
                .networks
                .get(network)
                .map(|n| n.ipam.clone())
                .unwrap_or_default()
        }

        /// Labels of a network.
        #[must_use]
        pub fn labels_of(&self, network: &str) -> HashMap<String, String> {
            self.state
                .lock()
                .networks
                .get(network)
                .map(|n| n.labels.clone())
                .unwrap_or_default()
        }

        /// Whether a container still exists.
        #[must_use]
        pub fn has_container(&self, name: &str) -> bool {
            self.state.lock().containers.contains(name)
        }

        /// Every call received so far.
        #[must_use]
        pub fn calls(&self) -> Vec<DaemonCall> {
            self.state.lock().calls.clone()
        }

        /// Calls that changed daemon state.
        #[must_use]
        pub fn mutations(&self) -> Vec<DaemonCall> {
            self.calls()
                .into_iter()
                .filter(DaemonCall::is_mutation)
                .collect()
        }

        /// Number of create calls received.
        #[must_use]
        pub fn create_calls(&self) -> usize {
            self.calls()
                .iter()
                .filter(|c| matches!(c, DaemonCall::Create(_)))
                .count()
        }

        /// Forget the recorded calls.
        pub fn clear_calls(&self) {
            self.state.lock().calls.clear();
        }
    }

    fn next_address(net: &MockNetwork) -> Option<String> {
        let subnet = net.ipam.iter().find_map(|c| c.subnet.as_deref())?;
        let parsed = cidr::parse(subnet)?;
        let offset = u32::try_from(net.endpoints.len()).ok()? + 2;
        let ip = std::net::Ipv4Addr::from(u32::from(parsed.network()) + offset);
        Some(format!("{ip}/{}", parsed.prefix()))
    }

    fn observe(name: &str, net: &MockNetwork) -> ObservedNetwork {
        ObservedNetwork {
            id: net.id.clone(),
            name: name.to_string(),
            driver: net.driver.clone(),
            ipam: net.ipam.clone(),
            labels: net.labels.clone(),
            endpoints: net
                .endpoints
                .iter()
                .map(|(name, ip)| AttachedEndpoint {
                    name: name.clone(),
                    ipv4: ip.clone(),
                })
                .collect(),
            ipv6: net.ipv6,
            attachable: net.attachable,
            options: net.options.clone(),
        }
    }

    #[async_trait]
    impl NetworkDaemon for MockDaemon {
        async fn is_available(&self) -> bool {
            let mut state = self.state.lock();
            state.calls.push(DaemonCall::Probe);
            !state.unavailable
        }

        async fn list_networks(&self, filter: Option<&str>) -> Result<Vec<NetworkRow>> {
            let mut state = self.state.lock();
            state.calls.push(DaemonCall::List(filter.map(str::to_string)));
            if state.unavailable {
                return Err(DaemonError::Unavailable);
            }
            if state.failures.list {
                return Err(failed("docker network ls".to_string()));
            }

            let wanted = filter
                .and_then(|f| f.strip_prefix("label="))
                .and_then(|kv| kv.split_once('='));
            Ok(state
                .networks
                .iter()
                .filter(|(_, net)| match wanted {
                    Some((k, v)) => net.labels.get(k).map(String::as_str) == Some(v),
                    None => true,
                })
                .map(|(name, net)| NetworkRow {
                    id: net.id[..12].to_string(),
                    name: name.clone(),
                    driver: net.driver.clone(),
                    scope: "local".to_string(),
                })
                .collect())
        }

        async fn inspect_networks(&self, refs: &[String]) -> Result<Vec<ObservedNetwork>> {
            let mut state = self.state.lock();
            state.calls.push(DaemonCall::Inspect(refs.to_vec()));
            if state.unavailable {
                return Err(DaemonError::Unavailable);
            }

            let mut found = Vec::with_capacity(refs.len());
            for reference in refs {
                if state.failures.inspect.contains(reference) {
                    return Err(failed(format!("docker network inspect {}", refs.join(" "))));
                }
                let hit = state
                    .networks
                    .iter()
                    .find(|(name, net)| *name == reference || net.id.starts_with(reference.as_str()));
                match hit {
                    Some((name, net)) => found.push(observe(name, net)),
                    None => {
                        return Err(failed(format!("docker network inspect {}", refs.join(" "))))
                    }
                }
            }
            Ok(found)
        }

        async fn create_network(&self, request: &CreateNetwork) -> Result<()> {
            let name = request.name.to_string();
            {
                let mut state = self.state.lock();
                state.calls.push(DaemonCall::Create(name.clone()));
                if state.failures.create.contains(&name) || state.networks.contains_key(&name) {
                    return Err(failed(render_create("docker", request)));
                }
            }

            self.insert(
                &name,
                &request.driver,
                request.ipam.clone(),
                request.labels.iter().cloned().collect(),
            );
            let mut state = self.state.lock();
            if let Some(net) = state.networks.get_mut(&name) {
                net.ipv6 = request.ipv6;
                net.attachable = request.attachable;
                if let Some(parent) = &request.parent {
                    net.options.insert("parent".to_string(), parent.clone());
                }
            }
            Ok(())
        }

        async fn remove_network(&self, name: &str) -> Result<()> {
            let mut state = self.state.lock();
            state.calls.push(DaemonCall::Remove(name.to_string()));
            let busy = state
                .networks
                .get(name)
                .map_or(true, |n| !n.endpoints.is_empty());
            if state.failures.remove.contains(name) || busy {
                return Err(failed(format!("docker network rm {name}")));
            }
            state.networks.remove(name);
            Ok(())
        }

        async fn connect(&self, network: &str, endpoint: &str) -> Result<()> {
            let mut state = self.state.lock();
            state.calls.push(DaemonCall::Connect {
                network: network.to_string(),
                endpoint: endpoint.to_string(),
            });
            let key = (network.to_string(), endpoint.to_string());
            if state.failures.connect.contains(&key) || !state.containers.contains(endpoint) {
                return Err(failed(format!("docker network connect {network} {endpoint}")));
            }
            let Some(net) = state.networks.get_mut(network) else {
                return Err(failed(format!("docker network connect {network} {endpoint}")));
            };
            let ip = next_address(net);
            net.endpoints.insert(endpoint.to_string(), ip);
            Ok(())
        }

        async fn disconnect(&self, network: &str, endpoint: &str, force: bool) -> Result<()> {
            let mut state = self.state.lock();
            state.calls.push(DaemonCall::Disconnect {
                network: network.to_string(),
                endpoint: endpoint.to_string(),
                force,
            });
            let key = (network.to_string(), endpoint.to_string());
            if state.failures.disconnect.contains(&key) {
                return Err(failed(format!("docker network disconnect {network} {endpoint}")));
            }
            let removed = state
                .networks
                .get_mut(network)
                .and_then(|net| net.endpoints.remove(endpoint));
            if removed.is_some() {
                Ok(())
            } else {
                Err(failed(format!("docker network disconnect {network} {endpoint}")))
            }
        }

        async fn remove_container(&self, container: &str) -> Result<()> {
            let mut state = self.state.lock();
            state
                .calls
                .push(DaemonCall::RemoveContainer(container.to_string()));
            if !state.containers.remove(container) {
                return Err(failed(format!("docker rm -f {container}")));
            }
            for net in state.networks.values_mut() {
                net.endpoints.remove(container);
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockDaemon;
    use super::*;
    use crate::types::IpamConfig;
    use docknet_core::NetworkName;
    use parking_lot::Mutex;

    /// Runner that records argv and replays canned outputs.
    #[derive(Default)]
    struct ScriptedRunner {
        seen: Mutex<Vec<Vec<String>>>,
        replies: Mutex<Vec<CommandOutput>>,
    }

    impl ScriptedRunner {
        fn replying(replies: Vec<CommandOutput>) -> Self {
            let mut replies = replies;
            replies.reverse();
            Self {
                seen: Mutex::new(Vec::new()),
                replies: Mutex::new(replies),
            }
        }
    }

    #[async_trait]
    impl CommandRunner for ScriptedRunner {
        async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
            let mut line = vec![program.to_string()];
            line.extend(args.iter().cloned());
            self.seen.lock().push(line);
            Ok(self
                .replies
                .lock()
                .pop()
                .unwrap_or_else(|| CommandOutput::ok("")))
        }
    }

    fn cli(replies: Vec<CommandOutput>) -> DockerCli<ScriptedRunner> {
        DockerCli::with_runner(ScriptedRunner::replying(replies), DaemonConfig::default())
    }

    #[tokio::test]
    async fn list_passes_filter_and_format() {
        let docker = cli(vec![CommandOutput::ok("abc\tnet-a\tbridge\tlocal\n")]);
        let rows = docker
            .list_networks(Some("label=com.vagrant.plugin=docker_networks_manager"))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "net-a");

        let seen = docker.runner.seen.lock().clone();
        assert_eq!(
            seen[0],
            vec![
                "docker",
                "network",
                "ls",
                "--filter",
                "label=com.vagrant.plugin=docker_networks_manager",
                "--format",
                NetworkRow::FORMAT,
            ]
        );
    }

    #[tokio::test]
    async fn create_failure_carries_rendered_command() {
        let docker = cli(vec![CommandOutput::failed(1, "pool overlaps")]);
        let request = CreateNetwork {
            name: NetworkName::parse("net-a").unwrap(),
            driver: "bridge".into(),
            labels: Vec::new(),
            ipam: vec![IpamConfig::subnet("10.0.0.0/24")],
            ipv6: false,
            attachable: false,
            parent: None,
        };
        let err = docker.create_network(&request).await.unwrap_err();
        assert_eq!(
            err.command(),
            Some("docker network create --driver bridge --subnet 10.0.0.0/24 net-a")
        );
    }

    #[tokio::test]
    async fn disconnect_force_flag() {
        let docker = cli(Vec::new());
        docker.disconnect("net-a", "web", true).await.unwrap();
        docker.disconnect("net-a", "db", false).await.unwrap();
        let seen = docker.runner.seen.lock().clone();
        assert_eq!(
            seen[0],
            vec!["docker", "network", "disconnect", "--force", "net-a", "web"]
        );
        assert_eq!(seen[1], vec!["docker", "network", "disconnect", "net-a", "db"]);
    }

    #[tokio::test]
    async fn probe_reports_failure_as_unavailable() {
        let docker = cli(vec![CommandOutput::failed(1, "Cannot connect")]);
        assert!(!docker.is_available().await);
    }

    #[tokio::test]
    async fn inspect_with_no_refs_skips_daemon() {
        let docker = cli(Vec::new());
        assert!(docker.inspect_networks(&[]).await.unwrap().is_empty());
        assert!(docker.runner.seen.lock().is_empty());
    }

    #[tokio::test]
    async fn mock_tracks_endpoints_and_refuses_busy_remove() {
        let daemon = MockDaemon::new();
        daemon.add_network("net-a", Some("10.0.0.0/24"), &[]);
        daemon.attach("net-a", "web");

        assert!(daemon.remove_network("net-a").await.is_err());
        daemon.disconnect("net-a", "web", true).await.unwrap();
        daemon.remove_network("net-a").await.unwrap();
        assert!(!daemon.has_network("net-a"));
    }

    #[tokio::test]
    async fn mock_assigns_addresses_from_subnet() {
        let daemon = MockDaemon::new();
        daemon.add_network("net-a", Some("10.0.0.0/24"), &[]);
        daemon.attach("net-a", "db");
        daemon.attach("net-a", "web");
        let nets = daemon
            .inspect_networks(&["net-a".to_string()])
            .await
            .unwrap();
        assert_eq!(nets[0].endpoints[0].ipv4.as_deref(), Some("10.0.0.2/24"));
        assert_eq!(nets[0].endpoints[1].ipv4.as_deref(), Some("10.0.0.3/24"));
    }
}
