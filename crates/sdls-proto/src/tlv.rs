//! Extended-procedure TLV data-unit header.
//!
//! Every extended-procedure PDU starts with a tag byte and a 16-bit
//! length: `Type(1) ‖ UF(1) ‖ SG(2) ‖ PID(4) ‖ PDU_LEN(16)`. The tag is
//! modelled as a sum type so the dispatcher matches procedures
//! exhaustively instead of switching on raw bits.

use bytes::BufMut;

use crate::errors::{FrameError, Result};

/// PDU direction: command from ground, or reply from the security unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PduType {
    /// Ground-originated command
    Command,
    /// Security-unit reply
    Reply,
}

/// Key-management procedures (service group 0b00).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyProcedure {
    /// Over-the-air rekeying: install encrypted session keys
    Otar,
    /// Transition keys from PREACTIVE to ACTIVE
    Activation,
    /// Transition keys from ACTIVE to DEACTIVATED
    Deactivation,
    /// Challenge-response proof of key possession
    Verification,
    /// Transition keys from DEACTIVATED to DESTROYED
    Destruction,
    /// Report the states of a key-id range
    Inventory,
}

/// SA-management procedures (service group 0b01).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaProcedure {
    /// Create a security association
    Create,
    /// Delete a security association
    Delete,
    /// Assign key ids (UNKEYED to KEYED)
    Rekey,
    /// Retire key material (KEYED to UNKEYED)
    Expire,
    /// Begin operational service (KEYED to OPERATIONAL)
    Start,
    /// Suspend operational service (OPERATIONAL to KEYED)
    Stop,
    /// Overwrite the anti-replay counter
    SetArsn,
    /// Overwrite the anti-replay window width
    SetArsnw,
    /// Report the anti-replay counter
    ReadArsn,
    /// Report the SA state
    Status,
}

/// Monitoring-and-control procedures (service group 0b10).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitoringProcedure {
    /// Liveness check, empty reply
    Ping,
    /// Report event-log fill level
    LogStatus,
    /// Return all event-log entries
    DumpLog,
    /// Zero the event log
    EraseLog,
    /// Run the self test
    SelfTest,
    /// Clear the frame-security-report alarm bits
    ResetAlarm,
}

/// A fully-identified extended procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Procedure {
    /// Key-management service group
    Key(KeyProcedure),
    /// SA-management service group
    Sa(SaProcedure),
    /// Monitoring-and-control service group
    Monitoring(MonitoringProcedure),
    /// User-defined procedure (tag had the user flag set)
    User(u8),
}

const SG_KEY_MGMT: u8 = 0b00;
const SG_SA_MGMT: u8 = 0b01;
const SG_MONITORING: u8 = 0b10;

impl Procedure {
    /// Decode the user flag, service group, and procedure id bits.
    ///
    /// # Errors
    ///
    /// [`FrameError::UnknownProcedure`] if the (SG, PID) pair is not
    /// assigned.
    pub fn from_bits(user_flag: bool, service_group: u8, pid: u8) -> Result<Self> {
        if user_flag {
            return Ok(Self::User(pid));
        }

        let unknown = FrameError::UnknownProcedure { service_group, pid };
        match service_group {
            SG_KEY_MGMT => Ok(Self::Key(match pid {
                0x1 => KeyProcedure::Otar,
                0x2 => KeyProcedure::Activation,
                0x3 => KeyProcedure::Deactivation,
                0x4 => KeyProcedure::Verification,
                0x5 => KeyProcedure::Destruction,
                0x6 => KeyProcedure::Inventory,
                _ => return Err(unknown),
            })),
            SG_SA_MGMT => Ok(Self::Sa(match pid {
                0x1 => SaProcedure::Create,
                0x2 => SaProcedure::Delete,
                0x3 => SaProcedure::Rekey,
                0x4 => SaProcedure::Expire,
                0x5 => SaProcedure::Start,
                0x6 => SaProcedure::Stop,
                0x7 => SaProcedure::SetArsn,
                0x8 => SaProcedure::SetArsnw,
                0x9 => SaProcedure::ReadArsn,
                0xA => SaProcedure::Status,
                _ => return Err(unknown),
            })),
            SG_MONITORING => Ok(Self::Monitoring(match pid {
                0x1 => MonitoringProcedure::Ping,
                0x2 => MonitoringProcedure::LogStatus,
                0x3 => MonitoringProcedure::DumpLog,
                0x4 => MonitoringProcedure::EraseLog,
                0x5 => MonitoringProcedure::SelfTest,
                0x6 => MonitoringProcedure::ResetAlarm,
                _ => return Err(unknown),
            })),
            _ => Err(unknown),
        }
    }

    /// (user flag, service group, procedure id) bits for this procedure.
    #[must_use]
    pub fn to_bits(self) -> (bool, u8, u8) {
        match self {
            Self::Key(p) => (
                false,
                SG_KEY_MGMT,
                match p {
                    KeyProcedure::Otar => 0x1,
                    KeyProcedure::Activation => 0x2,
                    KeyProcedure::Deactivation => 0x3,
                    KeyProcedure::Verification => 0x4,
                    KeyProcedure::Destruction => 0x5,
                    KeyProcedure::Inventory => 0x6,
                },
            ),
            Self::Sa(p) => (
                false,
                SG_SA_MGMT,
                match p {
                    SaProcedure::Create => 0x1,
                    SaProcedure::Delete => 0x2,
                    SaProcedure::Rekey => 0x3,
                    SaProcedure::Expire => 0x4,
                    SaProcedure::Start => 0x5,
                    SaProcedure::Stop => 0x6,
                    SaProcedure::SetArsn => 0x7,
                    SaProcedure::SetArsnw => 0x8,
                    SaProcedure::ReadArsn => 0x9,
                    SaProcedure::Status => 0xA,
                },
            ),
            Self::Monitoring(p) => (
                false,
                SG_MONITORING,
                match p {
                    MonitoringProcedure::Ping => 0x1,
                    MonitoringProcedure::LogStatus => 0x2,
                    MonitoringProcedure::DumpLog => 0x3,
                    MonitoringProcedure::EraseLog => 0x4,
                    MonitoringProcedure::SelfTest => 0x5,
                    MonitoringProcedure::ResetAlarm => 0x6,
                },
            ),
            Self::User(pid) => (true, 0, pid & 0x0F),
        }
    }
}

/// Extended-procedure data-unit header (3 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PduHeader {
    /// Command or reply
    pub pdu_type: PduType,
    /// Which procedure the payload belongs to
    pub procedure: Procedure,
    /// Payload length in octets
    pub pdu_len: u16,
}

impl PduHeader {
    /// Encoded size of the PDU header.
    pub const SIZE: usize = 3;

    /// Parse a PDU header from the start of `buf`.
    ///
    /// # Errors
    ///
    /// - [`FrameError::FrameTooShort`] if fewer than 3 bytes are supplied
    /// - [`FrameError::UnknownProcedure`] for unassigned (SG, PID) pairs
    pub fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < Self::SIZE {
            return Err(FrameError::FrameTooShort { expected: Self::SIZE, actual: buf.len() });
        }

        let tag = buf[0];
        let pdu_type = if tag & 0x80 != 0 { PduType::Reply } else { PduType::Command };
        let procedure = Procedure::from_bits(tag & 0x40 != 0, (tag & 0x30) >> 4, tag & 0x0F)?;

        Ok(Self {
            pdu_type,
            procedure,
            pdu_len: u16::from(buf[1]) << 8 | u16::from(buf[2]),
        })
    }

    /// Pack the header into its three-byte wire form.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let (uf, sg, pid) = self.procedure.to_bits();
        let tag = u8::from(matches!(self.pdu_type, PduType::Reply)) << 7
            | u8::from(uf) << 6
            | (sg & 0x03) << 4
            | (pid & 0x0F);
        [tag, ((self.pdu_len & 0xFF00) >> 8) as u8, (self.pdu_len & 0xFF) as u8]
    }

    /// Append the packed header to `dst`.
    pub fn write(&self, dst: &mut impl BufMut) {
        dst.put_slice(&self.to_bytes());
    }
}
