//! Error types for the protocol engine.
//!
//! Every rejection is a typed value; nothing is signalled through
//! sentinel integers. Ground systems that still speak the numeric status
//! convention can translate with [`ProcessingError::code`], which maps
//! each variant onto its stable status code.

use sdls_crypto::CryptoError;
use sdls_proto::FrameError;
use thiserror::Error;

use crate::{key_ring::KeyState, sa::SaState};

/// Stable status codes for telemetry and ground tooling.
pub mod status {
    /// Operation completed.
    pub const SUCCESS: u16 = 0;
    /// No operational SA covers the outbound channel.
    pub const TC_APPLY_NO_SA: u16 = 1;
    /// SPI reserved, out of range, or unknown.
    pub const SPI_INVALID: u16 = 2;
    /// SA exists but is not in the required state.
    pub const SA_STATE_INVALID: u16 = 3;
    /// Received IV is beyond the acceptance window.
    pub const IV_OUTSIDE_WINDOW: u16 = 4;
    /// Received IV does not exceed the last accepted IV.
    pub const IV_REPLAY: u16 = 5;
    /// Received ARSN is beyond the acceptance window.
    pub const ARSN_OUTSIDE_WINDOW: u16 = 6;
    /// Authentication tag mismatch.
    pub const MAC_VALIDATION_ERROR: u16 = 7;
    /// Frame error control field mismatch.
    pub const FECF_INVALID: u16 = 8;
    /// Frame would not fit the 10-bit length field or the buffer.
    pub const FRAME_SIZE_OVERFLOW: u16 = 9;
    /// Key missing or not in the state the operation requires.
    pub const KEY_STATE_INVALID: u16 = 10;
    /// OTAR addressed a key outside the master-key range.
    pub const OTAR_MKID_INVALID: u16 = 11;
    /// Primitive provider failed for a non-integrity reason.
    pub const CRYPTO_PRIMITIVE_FAIL: u16 = 12;
    /// Spacecraft id does not match the managed parameters.
    pub const SCID_MISMATCH: u16 = 13;
    /// Frame or PDU failed structural parsing.
    pub const FRAME_MALFORMED: u16 = 14;
}

/// Errors from the apply/process pipelines and extended procedures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcessingError {
    /// No operational SA is bound to the outbound channel
    #[error("no operational SA for vcid {vcid}, mapid {mapid:?}")]
    NoApplicableSa {
        /// Virtual channel of the outbound frame
        vcid: u8,
        /// MAP id, when the channel carries segment headers
        mapid: Option<u8>,
    },

    /// SPI is reserved, exceeds the SA table, or names no SA
    #[error("invalid spi {spi}")]
    SpiInvalid {
        /// The offending SPI
        spi: u16,
    },

    /// SA is not in the state the operation requires
    #[error("sa {spi} in state {state:?} cannot service this operation")]
    SaStateInvalid {
        /// SPI of the SA
        spi: u16,
        /// State the SA was found in
        state: SaState,
    },

    /// The SA's channel table does not admit this frame
    #[error("sa {spi} does not admit vcid {vcid}")]
    ChannelNotAdmitted {
        /// SPI of the SA
        spi: u16,
        /// Virtual channel of the rejected frame
        vcid: u8,
    },

    /// Spacecraft id is not configured in the managed parameters
    #[error("scid {scid} does not match managed parameters")]
    ScidMismatch {
        /// Spacecraft id from the frame
        scid: u16,
    },

    /// No managed-parameters entry covers this channel
    #[error("channel (tfvn {tfvn}, scid {scid}, vcid {vcid}) is not managed")]
    ChannelNotManaged {
        /// Transfer frame version from the frame
        tfvn: u8,
        /// Spacecraft id from the frame
        scid: u16,
        /// Virtual channel from the frame
        vcid: u8,
    },

    /// Received IV lies beyond the anti-replay acceptance window
    #[error("iv outside anti-replay window on sa {spi}")]
    IvOutsideWindow {
        /// SPI of the SA
        spi: u16,
    },

    /// Received IV does not exceed the last accepted IV
    #[error("iv replay on sa {spi}")]
    IvReplay {
        /// SPI of the SA
        spi: u16,
    },

    /// Received ARSN lies beyond the anti-replay acceptance window
    #[error("arsn outside anti-replay window on sa {spi}")]
    ArsnOutsideWindow {
        /// SPI of the SA
        spi: u16,
    },

    /// Received ARSN does not exceed the last accepted ARSN
    #[error("arsn replay on sa {spi}")]
    ArsnReplay {
        /// SPI of the SA
        spi: u16,
    },

    /// Authentication tag failed to verify
    #[error("mac validation failed on sa {spi}")]
    MacValidation {
        /// SPI of the SA
        spi: u16,
    },

    /// Frame error control field mismatch
    #[error("fecf mismatch: received {received:#06x}, computed {computed:#06x}")]
    FecfInvalid {
        /// FECF carried by the frame
        received: u16,
        /// FECF computed over the frame
        computed: u16,
    },

    /// Frame exceeds the encodable or supplied size
    #[error("frame size {size} exceeds maximum {max}")]
    FrameSizeOverflow {
        /// Size the frame would need
        size: usize,
        /// Largest size allowed
        max: usize,
    },

    /// Key id names no slot in the ring
    #[error("key {kid} not found")]
    KeyNotFound {
        /// The offending key id
        kid: u16,
    },

    /// Key is not in the state the operation requires
    #[error("key {kid} in state {state:?} cannot service this operation")]
    KeyStateInvalid {
        /// Key id
        kid: u16,
        /// State the key was found in
        state: KeyState,
    },

    /// OTAR named a key outside the master-key range, or tried to
    /// deliver into it
    #[error("key {kid} is not usable as addressed by otar")]
    OtarMasterKeyInvalid {
        /// The offending key id
        kid: u16,
    },

    /// Starting this SA would violate single-operational-SA-per-channel
    #[error("another operational sa already covers the channel of sa {spi}")]
    DuplicateOperationalSa {
        /// SPI of the SA that could not be started
        spi: u16,
    },

    /// A per-SA counter wrapped past its most significant byte
    #[error("counter wrapped on sa {spi}")]
    CounterWrap {
        /// SPI of the SA
        spi: u16,
    },

    /// Extended-procedure PDU was structurally invalid
    #[error("malformed pdu: {reason}")]
    PduMalformed {
        /// What was wrong with it
        reason: &'static str,
    },

    /// Frame-level codec error
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// Primitive-provider failure other than a tag mismatch
    #[error("crypto primitive error: {0}")]
    Crypto(#[from] CryptoError),
}

impl ProcessingError {
    /// Stable status code for this error.
    #[must_use]
    pub fn code(&self) -> u16 {
        match self {
            Self::NoApplicableSa { .. } => status::TC_APPLY_NO_SA,
            Self::SpiInvalid { .. } => status::SPI_INVALID,
            Self::SaStateInvalid { .. }
            | Self::ChannelNotAdmitted { .. }
            | Self::DuplicateOperationalSa { .. } => status::SA_STATE_INVALID,
            Self::ScidMismatch { .. } | Self::ChannelNotManaged { .. } => status::SCID_MISMATCH,
            Self::IvOutsideWindow { .. } => status::IV_OUTSIDE_WINDOW,
            Self::IvReplay { .. } | Self::ArsnReplay { .. } => status::IV_REPLAY,
            Self::ArsnOutsideWindow { .. } => status::ARSN_OUTSIDE_WINDOW,
            Self::MacValidation { .. } => status::MAC_VALIDATION_ERROR,
            Self::FecfInvalid { .. } => status::FECF_INVALID,
            Self::FrameSizeOverflow { .. } | Self::CounterWrap { .. } => {
                status::FRAME_SIZE_OVERFLOW
            },
            Self::KeyNotFound { .. } | Self::KeyStateInvalid { .. } => status::KEY_STATE_INVALID,
            Self::OtarMasterKeyInvalid { .. } => status::OTAR_MKID_INVALID,
            Self::PduMalformed { .. } | Self::Frame(_) => status::FRAME_MALFORMED,
            Self::Crypto(_) => status::CRYPTO_PRIMITIVE_FAIL,
        }
    }
}
