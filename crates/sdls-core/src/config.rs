//! Engine configuration and per-channel managed parameters.
//!
//! Everything a mission fixes before flight lives here: which optional
//! frame fields each virtual channel carries, which validations may be
//! relaxed for test campaigns, and which backing implementations the
//! context should construct.

use sdls_proto::Gvcid;

/// Which SA-store implementation the context constructs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SaStoreKind {
    /// Bounded in-memory table (reference implementation)
    #[default]
    InMemory,
}

/// Which primitive provider the context constructs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProviderKind {
    /// AES-256-GCM / AES-256-CMAC via the RustCrypto crates
    #[default]
    RustCrypto,
}

/// Static declaration for one virtual channel.
///
/// Managed parameters are mission configuration, not negotiated state:
/// they say whether frames on a channel carry an FECF and a segment
/// header, and pin the (TFVN, SCID) pair the channel accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManagedParameters {
    /// Transfer frame version number this channel accepts
    pub tfvn: u8,
    /// Spacecraft id this channel accepts
    pub scid: u16,
    /// Virtual channel id
    pub vcid: u8,
    /// Frames on this channel end with an FECF
    pub has_fecf: bool,
    /// Frames on this channel carry a segment header
    pub has_segment_header: bool,
}

impl ManagedParameters {
    /// The channel identity this entry declares.
    #[must_use]
    pub fn gvcid(&self) -> Gvcid {
        Gvcid { tfvn: self.tfvn, scid: self.scid, vcid: self.vcid }
    }
}

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// SA-store implementation to construct
    pub store_kind: SaStoreKind,
    /// Primitive provider to construct
    pub provider_kind: ProviderKind,
    /// Apply writes an FECF onto outbound frames
    pub create_fecf: bool,
    /// Process inspects payloads for extended-procedure packets
    pub process_sdls_pdus: bool,
    /// Extended-procedure packets carry a PUS secondary header
    pub has_pus_header: bool,
    /// Accept frames on non-operational SAs (test campaigns only)
    pub ignore_sa_state: bool,
    /// Skip anti-replay checks (test campaigns only)
    pub ignore_anti_replay: bool,
    /// Bind SAs to (channel, MAP id) instead of channel alone
    pub unique_sa_per_mapid: bool,
    /// Process verifies inbound FECFs
    pub check_fecf: bool,
    /// Mask applied to the received VCID before lookups
    pub vcid_bitmask: u8,
    /// Allow the user service group to arm fault injection
    pub enable_fault_injection: bool,
    managed: Vec<ManagedParameters>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_kind: SaStoreKind::InMemory,
            provider_kind: ProviderKind::RustCrypto,
            create_fecf: true,
            process_sdls_pdus: true,
            has_pus_header: true,
            ignore_sa_state: false,
            ignore_anti_replay: false,
            unique_sa_per_mapid: false,
            check_fecf: true,
            vcid_bitmask: 0x3F,
            enable_fault_injection: false,
            managed: Vec::new(),
        }
    }
}

impl Config {
    /// Configuration with flight defaults: all validations on, no fault
    /// injection, no channels declared yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a managed channel. Later declarations win on conflict.
    pub fn add_managed_parameters(&mut self, params: ManagedParameters) {
        self.managed
            .retain(|m| (m.tfvn, m.scid, m.vcid) != (params.tfvn, params.scid, params.vcid));
        self.managed.push(params);
    }

    /// Look up the declaration for an exact (TFVN, SCID, VCID).
    #[must_use]
    pub fn managed_parameters(&self, gvcid: Gvcid) -> Option<&ManagedParameters> {
        self.managed.iter().find(|m| m.gvcid() == gvcid)
    }

    /// True when some channel is declared for this spacecraft id.
    #[must_use]
    pub fn knows_scid(&self, scid: u16) -> bool {
        self.managed.iter().any(|m| m.scid == scid)
    }
}
