//! Address resolution - the ordered fallback chain over a contact's
//! possible addresses.
//!
//! Resolution prefers addresses the contact advertised (IPv4, then IPv6),
//! falls back to the link-local address derived from the contact's
//! hardware address, and consults the rendezvous directory only as a last
//! resort. Every reply is identity-checked: a responder whose hardware
//! address differs from the target is indistinguishable from no answer and
//! the chain moves on.
//!
//! The chain is an explicit state machine: [`Step`] names each branch and
//! the resolve loop maps (step, probe outcome) to the next step or a
//! terminal result. Attempted `(address, port)` pairs are recorded so skip
//! conditions are checked against data rather than hidden in recursion.

use crate::probe::{Prober, TcpProber};
use crate::rendezvous::{Directory, RendezvousClient};
use peerline_proto::{ContactInfo, MacAddr, link_local_from_mac};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::time::Duration;

/// Default timeout for a single discovery probe
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// The peer identity a resolution attempt is trying to locate.
///
/// `mac` is the identity key; `ipv4`/`ipv6` are hints that may be stale or
/// absent.
#[derive(Debug, Clone)]
pub struct ResolveTarget {
    /// Display name, carried through to failure reports
    pub name: String,
    /// Hardware address - the identity being resolved
    pub mac: MacAddr,
    /// Advertised IPv4 address, if any
    pub ipv4: Option<Ipv4Addr>,
    /// Advertised IPv6 address, if any
    pub ipv6: Option<Ipv6Addr>,
    /// Inbox port to probe
    pub port: u16,
}

/// A successful resolution: the verified address and the peer's reply
#[derive(Debug, Clone)]
pub struct Resolution {
    /// Address that answered with the expected identity
    pub addr: IpAddr,
    /// Port that answered
    pub port: u16,
    /// The verified reply record
    pub info: ContactInfo,
}

/// Terminal failure: every branch of the chain was exhausted
#[derive(Debug, Clone, thiserror::Error)]
#[error("could not resolve {name} ({mac})")]
pub struct Unresolvable {
    /// Name of the contact that could not be resolved
    pub name: String,
    /// Hardware address of the contact that could not be resolved
    pub mac: MacAddr,
}

/// One branch of the fallback chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    /// Contact advertises both families: try IPv4 first
    Ipv4AndIpv6,
    /// Try the advertised IPv6 address
    Ipv6Hint,
    /// Contact advertises IPv4 only
    Ipv4Only,
    /// Try the link-local address derived from the hardware address
    DerivedLinkLocal,
    /// Ask the rendezvous directory
    Rendezvous,
}

impl Step {
    fn initial(target: &ResolveTarget) -> Self {
        match (target.ipv4.is_some(), target.ipv6.is_some()) {
            (true, true) => Step::Ipv4AndIpv6,
            (false, true) => Step::Ipv6Hint,
            (true, false) => Step::Ipv4Only,
            (false, false) => Step::DerivedLinkLocal,
        }
    }
}

/// Drives the fallback chain for one contact at a time.
///
/// Generic over the probe and directory capabilities so the branch logic
/// can be tested without sockets; production use is
/// [`Resolver::new`], which wires in [`TcpProber`] and
/// [`RendezvousClient`].
#[derive(Debug, Clone)]
pub struct Resolver<P = TcpProber, D = RendezvousClient> {
    prober: P,
    directory: Option<D>,
    probe_timeout: Duration,
}

impl Resolver<TcpProber, RendezvousClient> {
    /// Production resolver over TCP probes and an optional rendezvous
    /// directory
    #[must_use]
    pub fn new(probe_timeout: Duration, rendezvous: Option<RendezvousClient>) -> Self {
        Self::with_parts(TcpProber, rendezvous, probe_timeout)
    }
}

impl<P: Prober, D: Directory> Resolver<P, D> {
    /// Assemble a resolver from explicit capabilities
    #[must_use]
    pub fn with_parts(prober: P, directory: Option<D>, probe_timeout: Duration) -> Self {
        Self {
            prober,
            directory,
            probe_timeout,
        }
    }

    /// Run the fallback chain to a single terminal outcome.
    ///
    /// Exactly one of: a [`Resolution`] whose reply passed the identity
    /// check, or [`Unresolvable`] once every branch is exhausted.
    ///
    /// # Errors
    ///
    /// Returns [`Unresolvable`] carrying the contact's name and hardware
    /// address when no branch produced a verified reply.
    pub async fn resolve(&self, target: &ResolveTarget) -> Result<Resolution, Unresolvable> {
        tracing::info!(name = %target.name, mac = %target.mac, "resolving contact");

        let derived = link_local_from_mac(target.mac);
        let mut tried: Vec<(IpAddr, u16)> = Vec::new();
        let mut step = Step::initial(target);

        loop {
            step = match step {
                Step::Ipv4AndIpv6 => match target.ipv4 {
                    Some(v4) => {
                        tracing::info!(name = %target.name, "contact has IPv4 and IPv6 addresses");
                        match self.attempt(target, IpAddr::V4(v4), target.port, &mut tried).await {
                            Some(res) => return Ok(res),
                            None => Step::Ipv6Hint,
                        }
                    }
                    None => Step::Ipv6Hint,
                },

                Step::Ipv6Hint => match target.ipv6 {
                    Some(v6) => {
                        match self.attempt(target, IpAddr::V6(v6), target.port, &mut tried).await {
                            Some(res) => return Ok(res),
                            None if v6 == derived => {
                                tracing::info!(
                                    addr = %v6,
                                    "advertised IPv6 address is the derived link-local form"
                                );
                                self.rendezvous_or_fail(target)?
                            }
                            None => Step::DerivedLinkLocal,
                        }
                    }
                    None => Step::DerivedLinkLocal,
                },

                Step::Ipv4Only => match target.ipv4 {
                    Some(v4) => {
                        tracing::info!(name = %target.name, "contact has an IPv4 address only");
                        match self.attempt(target, IpAddr::V4(v4), target.port, &mut tried).await {
                            Some(res) => return Ok(res),
                            None => Step::DerivedLinkLocal,
                        }
                    }
                    None => Step::DerivedLinkLocal,
                },

                Step::DerivedLinkLocal => {
                    let addr = IpAddr::V6(derived);
                    if tried.contains(&(addr, target.port)) {
                        tracing::info!(%addr, "derived link-local address already attempted");
                        self.rendezvous_or_fail(target)?
                    } else {
                        tracing::info!(%addr, "trying derived link-local address");
                        match self.attempt(target, addr, target.port, &mut tried).await {
                            Some(res) => return Ok(res),
                            None => self.rendezvous_or_fail(target)?,
                        }
                    }
                }

                Step::Rendezvous => {
                    return self.resolve_via_directory(target, &mut tried).await;
                }
            };
        }
    }

    /// Probe one address and identity-check the reply.
    ///
    /// Returns `None` for every kind of branch failure: no reply, refused
    /// connection, malformed record, or a reply claiming the wrong
    /// hardware address. The distinction only matters for the trace log.
    async fn attempt(
        &self,
        target: &ResolveTarget,
        addr: IpAddr,
        port: u16,
        tried: &mut Vec<(IpAddr, u16)>,
    ) -> Option<Resolution> {
        tried.push((addr, port));
        tracing::info!(name = %target.name, %addr, port, "probing");

        match self.prober.probe(addr, port, self.probe_timeout).await {
            Ok(info) if info.mac_address == target.mac => {
                tracing::info!(name = %target.name, %addr, port, "contact verified");
                Some(Resolution { addr, port, info })
            }
            Ok(info) => {
                tracing::info!(
                    expected = %target.mac,
                    claimed = %info.mac_address,
                    %addr,
                    "unexpected peer answered the probe"
                );
                None
            }
            Err(e) => {
                tracing::info!(%addr, port, error = %e, "probe failed");
                None
            }
        }
    }

    /// Move to the rendezvous branch, or end the attempt when no
    /// directory is configured.
    fn rendezvous_or_fail(&self, target: &ResolveTarget) -> Result<Step, Unresolvable> {
        if self.directory.is_some() {
            tracing::info!("falling back to the rendezvous directory");
            Ok(Step::Rendezvous)
        } else {
            tracing::info!(name = %target.name, "no rendezvous directory configured");
            Err(self.unresolvable(target))
        }
    }

    /// The last-resort branch: ask the directory, then probe its
    /// suggestion unless that address already failed in this attempt.
    async fn resolve_via_directory(
        &self,
        target: &ResolveTarget,
        tried: &mut Vec<(IpAddr, u16)>,
    ) -> Result<Resolution, Unresolvable> {
        let Some(directory) = &self.directory else {
            return Err(self.unresolvable(target));
        };

        tracing::info!(mac = %target.mac, "asking rendezvous directory");
        let record = match directory.lookup_by_mac(target.mac).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                tracing::info!(mac = %target.mac, "directory has no record for contact");
                return Err(self.unresolvable(target));
            }
            Err(e) => {
                tracing::info!(error = %e, "directory lookup failed");
                return Err(self.unresolvable(target));
            }
        };

        let addr = IpAddr::V4(record.ipv4_addr);
        tracing::info!(%addr, port = record.port, "directory suggested an address");

        if tried.contains(&(addr, record.port)) {
            tracing::info!(
                %addr,
                port = record.port,
                "suggested address was already attempted and failed"
            );
            return Err(self.unresolvable(target));
        }

        match self.attempt(target, addr, record.port, tried).await {
            Some(res) => Ok(res),
            None => Err(self.unresolvable(target)),
        }
    }

    fn unresolvable(&self, target: &ResolveTarget) -> Unresolvable {
        tracing::info!(name = %target.name, mac = %target.mac, "could not resolve contact");
        Unresolvable {
            name: target.name.clone(),
            mac: target.mac,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::ProbeError;
    use crate::rendezvous::RendezvousError;
    use peerline_proto::ClientRecord;
    use std::collections::HashMap;
    use std::sync::Mutex;

    const PORT: u16 = 42000;

    fn mac() -> MacAddr {
        "AA:BB:CC:DD:EE:FF".parse().unwrap()
    }

    fn other_mac() -> MacAddr {
        "11:22:33:44:55:66".parse().unwrap()
    }

    fn info_for(mac: MacAddr) -> ContactInfo {
        ContactInfo {
            mac_address: mac,
            name: None,
            ipv4_addr: None,
            port: PORT,
        }
    }

    fn target(ipv4: Option<&str>, ipv6: Option<&str>) -> ResolveTarget {
        ResolveTarget {
            name: "peer".to_string(),
            mac: mac(),
            ipv4: ipv4.map(|s| s.parse().unwrap()),
            ipv6: ipv6.map(|s| s.parse().unwrap()),
            port: PORT,
        }
    }

    /// Prober answering from a fixed table; everything else times out.
    /// Records the order of probed addresses.
    struct ScriptedProber {
        replies: HashMap<(IpAddr, u16), ContactInfo>,
        log: Mutex<Vec<(IpAddr, u16)>>,
    }

    impl ScriptedProber {
        fn new(replies: impl IntoIterator<Item = ((&'static str, u16), ContactInfo)>) -> Self {
            Self {
                replies: replies
                    .into_iter()
                    .map(|((addr, port), info)| ((addr.parse().unwrap(), port), info))
                    .collect(),
                log: Mutex::new(Vec::new()),
            }
        }

        fn probed(&self) -> Vec<(IpAddr, u16)> {
            self.log.lock().unwrap().clone()
        }
    }

    impl Prober for &ScriptedProber {
        async fn probe(
            &self,
            addr: IpAddr,
            port: u16,
            timeout: Duration,
        ) -> Result<ContactInfo, ProbeError> {
            self.log.lock().unwrap().push((addr, port));
            self.replies
                .get(&(addr, port))
                .cloned()
                .ok_or(ProbeError::Unreachable {
                    addr,
                    port,
                    timeout,
                })
        }
    }

    enum ScriptedDirectory {
        Found(ClientRecord),
        Empty,
        Down,
    }

    impl Directory for ScriptedDirectory {
        async fn lookup_by_mac(
            &self,
            _mac: MacAddr,
        ) -> Result<Option<ClientRecord>, RendezvousError> {
            match self {
                ScriptedDirectory::Found(record) => Ok(Some(*record)),
                ScriptedDirectory::Empty => Ok(None),
                ScriptedDirectory::Down => Err(RendezvousError::Network("down".to_string())),
            }
        }
    }

    fn resolver<'a>(
        prober: &'a ScriptedProber,
        directory: Option<ScriptedDirectory>,
    ) -> Resolver<&'a ScriptedProber, ScriptedDirectory> {
        Resolver::with_parts(prober, directory, Duration::from_millis(10))
    }

    fn derived() -> IpAddr {
        IpAddr::V6(link_local_from_mac(mac()))
    }

    #[tokio::test]
    async fn test_dual_stack_ipv4_match_short_circuits() {
        let prober = ScriptedProber::new([(("10.0.0.5", PORT), info_for(mac()))]);
        let t = target(Some("10.0.0.5"), Some("fe80::1"));

        let res = resolver(&prober, None).resolve(&t).await.unwrap();
        assert_eq!(res.addr, "10.0.0.5".parse::<IpAddr>().unwrap());
        // Nothing beyond the first branch was consulted.
        assert_eq!(prober.probed(), vec![("10.0.0.5".parse().unwrap(), PORT)]);
    }

    #[tokio::test]
    async fn test_all_branches_fail_without_directory() {
        let prober = ScriptedProber::new([]);
        let t = target(Some("10.0.0.5"), Some("fe80::1"));

        let err = resolver(&prober, None).resolve(&t).await.unwrap_err();
        assert_eq!(err.name, "peer");
        assert_eq!(err.mac, mac());
        // Deterministic order, bounded attempts: v4, v6 hint, derived.
        assert_eq!(
            prober.probed(),
            vec![
                ("10.0.0.5".parse().unwrap(), PORT),
                ("fe80::1".parse().unwrap(), PORT),
                (derived(), PORT),
            ]
        );
    }

    #[tokio::test]
    async fn test_supplied_ipv6_equals_derived_goes_straight_to_directory() {
        let prober = ScriptedProber::new([]);
        let derived_v6 = link_local_from_mac(mac());
        let t = ResolveTarget {
            ipv6: Some(derived_v6),
            ..target(None, None)
        };

        let err = resolver(&prober, Some(ScriptedDirectory::Empty))
            .resolve(&t)
            .await
            .unwrap_err();
        assert_eq!(err.mac, mac());
        // The derived address was probed exactly once.
        assert_eq!(prober.probed(), vec![(IpAddr::V6(derived_v6), PORT)]);
    }

    #[tokio::test]
    async fn test_supplied_ipv6_equals_derived_fails_without_directory() {
        let prober = ScriptedProber::new([]);
        let t = ResolveTarget {
            ipv6: Some(link_local_from_mac(mac())),
            ..target(None, None)
        };

        assert!(resolver(&prober, None).resolve(&t).await.is_err());
        assert_eq!(prober.probed().len(), 1);
    }

    #[tokio::test]
    async fn test_ipv4_only_falls_back_to_derived() {
        let prober = ScriptedProber::new([((
            // Derived link-local answers with the right identity.
            "fe80::a8bb:ccff:fedd:eeff",
            PORT,
        ), info_for(mac()))]);
        let t = target(Some("10.0.0.5"), None);

        let res = resolver(&prober, None).resolve(&t).await.unwrap();
        assert_eq!(res.addr, derived());
        assert_eq!(res.info.mac_address, mac());
    }

    #[tokio::test]
    async fn test_identity_mismatch_never_succeeds() {
        // Every address answers, but always with the wrong identity.
        let prober = ScriptedProber::new([
            (("10.0.0.5", PORT), info_for(other_mac())),
            (("fe80::a8bb:ccff:fedd:eeff", PORT), info_for(other_mac())),
        ]);
        let t = target(Some("10.0.0.5"), None);

        let err = resolver(&prober, None).resolve(&t).await.unwrap_err();
        assert_eq!(err.mac, mac());
    }

    #[tokio::test]
    async fn test_directory_suggestion_probed_and_verified() {
        let prober = ScriptedProber::new([(("10.0.0.9", PORT), info_for(mac()))]);
        let t = target(Some("10.0.0.5"), Some("fe80::1"));
        let directory = ScriptedDirectory::Found(ClientRecord {
            ipv4_addr: "10.0.0.9".parse().unwrap(),
            port: PORT,
        });

        let res = resolver(&prober, Some(directory)).resolve(&t).await.unwrap();
        assert_eq!(res.addr, "10.0.0.9".parse::<IpAddr>().unwrap());
        assert_eq!(res.port, PORT);
    }

    #[tokio::test]
    async fn test_directory_suggestion_already_tried_is_not_reprobed() {
        let prober = ScriptedProber::new([]);
        let t = target(Some("10.0.0.5"), Some("fe80::1"));
        let directory = ScriptedDirectory::Found(ClientRecord {
            ipv4_addr: "10.0.0.5".parse().unwrap(),
            port: PORT,
        });

        let err = resolver(&prober, Some(directory)).resolve(&t).await.unwrap_err();
        assert_eq!(err.mac, mac());
        // The suggested address shows up once (the direct branch), not twice.
        let hits = prober
            .probed()
            .iter()
            .filter(|(a, _)| *a == "10.0.0.5".parse::<IpAddr>().unwrap())
            .count();
        assert_eq!(hits, 1);
    }

    #[tokio::test]
    async fn test_directory_unknown_contact_is_terminal() {
        let prober = ScriptedProber::new([]);
        let t = target(Some("10.0.0.5"), None);

        let err = resolver(&prober, Some(ScriptedDirectory::Empty))
            .resolve(&t)
            .await
            .unwrap_err();
        assert_eq!(err.name, "peer");
    }

    #[tokio::test]
    async fn test_directory_failure_is_terminal() {
        let prober = ScriptedProber::new([]);
        let t = target(Some("10.0.0.5"), None);

        assert!(
            resolver(&prober, Some(ScriptedDirectory::Down))
                .resolve(&t)
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_mismatch_on_suggestion_is_terminal() {
        let prober = ScriptedProber::new([(("10.0.0.9", PORT), info_for(other_mac()))]);
        let t = target(Some("10.0.0.5"), None);
        let directory = ScriptedDirectory::Found(ClientRecord {
            ipv4_addr: "10.0.0.9".parse().unwrap(),
            port: PORT,
        });

        assert!(
            resolver(&prober, Some(directory))
                .resolve(&t)
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_no_hints_starts_at_derived() {
        let prober = ScriptedProber::new([]);
        let t = target(None, None);

        let _ = resolver(&prober, None).resolve(&t).await;
        assert_eq!(prober.probed(), vec![(derived(), PORT)]);
    }
}
