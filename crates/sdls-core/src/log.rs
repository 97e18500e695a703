//! Bounded security event log.
//!
//! Every frame-implicating rejection appends one entry: an event type, a
//! four-byte event value (the implicated SPI or key id, big-endian,
//! zero-padded), and the value length. When the log is full new events
//! are dropped; the summary keeps counting so the ground can tell.

/// Number of entries the log holds.
pub const LOG_CAPACITY: usize = 50;

/// Width of the event value field.
pub const EVENT_VALUE_LEN: usize = 4;

/// Event types recorded in the log and reported by dump-log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    /// Engine initialized
    Startup,
    /// FECF mismatch on a received frame
    FecfError,
    /// SPI reserved, out of range, or unknown
    SpiInvalid,
    /// SA not operational for a received frame
    SaStateError,
    /// SA admission table rejected the frame's channel
    ChannelError,
    /// Received IV outside the acceptance window
    IvWindowError,
    /// Received IV at or below the last accepted IV
    IvReplayError,
    /// Received ARSN outside the acceptance window
    ArsnWindowError,
    /// Received ARSN at or below the last accepted ARSN
    ArsnReplayError,
    /// Authentication tag mismatch
    MacError,
    /// OTAR addressed a non-master key as master
    MkidInvalid,
    /// OTAR tried to deliver into the master range
    OtarMasterKey,
    /// Commanded state change on a master key
    MasterKeyStateError,
    /// Key transition was not one step forward
    KeyTransitionError,
}

impl EventType {
    /// One-byte code used in dump-log replies.
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Self::Startup => 0x01,
            Self::FecfError => 0x10,
            Self::SpiInvalid => 0x11,
            Self::SaStateError => 0x12,
            Self::ChannelError => 0x13,
            Self::IvWindowError => 0x14,
            Self::IvReplayError => 0x15,
            Self::ArsnWindowError => 0x16,
            Self::ArsnReplayError => 0x17,
            Self::MacError => 0x18,
            Self::MkidInvalid => 0x20,
            Self::OtarMasterKey => 0x21,
            Self::MasterKeyStateError => 0x22,
            Self::KeyTransitionError => 0x23,
        }
    }
}

/// One log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventEntry {
    /// What happened
    pub event: EventType,
    /// Implicated SPI or key id, big-endian, zero-padded
    pub value: [u8; EVENT_VALUE_LEN],
    /// Meaningful bytes in `value`
    pub len: u8,
}

/// Log fill level as reported by log-status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogSummary {
    /// Events recorded since the last log-status read (keeps counting
    /// past capacity)
    pub events_since_read: u32,
    /// Entries the log can still hold
    pub remaining_slots: u16,
}

/// Append-only bounded event log.
pub struct EventLog {
    entries: Vec<EventEntry>,
    events_since_read: u32,
}

impl EventLog {
    /// An empty log.
    #[must_use]
    pub fn new() -> Self {
        Self { entries: Vec::with_capacity(LOG_CAPACITY), events_since_read: 0 }
    }

    /// Record an event with a 16-bit value (SPI or key id).
    pub fn record(&mut self, event: EventType, value: u16) {
        self.events_since_read = self.events_since_read.saturating_add(1);
        if self.entries.len() >= LOG_CAPACITY {
            tracing::warn!(event = ?event, "event log full, entry dropped");
            return;
        }
        let be = value.to_be_bytes();
        self.entries.push(EventEntry {
            event,
            value: [0, 0, be[0], be[1]],
            len: EVENT_VALUE_LEN as u8,
        });
    }

    /// Current fill level.
    #[must_use]
    pub fn summary(&self) -> LogSummary {
        LogSummary {
            events_since_read: self.events_since_read,
            remaining_slots: (LOG_CAPACITY - self.entries.len()) as u16,
        }
    }

    /// Fill level for a log-status reply; resets the since-read count.
    pub fn summary_and_mark_read(&mut self) -> LogSummary {
        let summary = self.summary();
        self.events_since_read = 0;
        summary
    }

    /// All recorded entries, oldest first.
    #[must_use]
    pub fn entries(&self) -> &[EventEntry] {
        &self.entries
    }

    /// Zero the buffer and reset the counts.
    pub fn erase(&mut self) {
        self.entries.clear();
        self.events_since_read = 0;
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}
