//! # Command Flags
//!
//! Per-call policy for the response queue, along two independent axes:
//!
//! | policy    | existing queue | this reply |
//! |-----------|----------------|------------|
//! | `DEFAULT` | flush          | queue      |
//! | `STASH`   | persist        | queue      |
//! | `CLEAR`   | flush          | discard    |
//! | `VOID`    | persist        | discard    |
//!
//! `CommandFlags` holds exactly one choice per axis, so a flush+persist or
//! queue+discard policy cannot be constructed. Raw flag sets coming from
//! outside the type system (bit masks, strings) are checked by
//! [`CommandFlags::from_flags`], [`CommandFlags::from_bits`] and `FromStr`,
//! which reject contradictions with [`PolicyConflict`] before anything is sent.

use std::fmt;
use std::str::FromStr;

use crate::error::PolicyConflict;

/// What happens to previously queued responses before a command runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Retention {
    Flush,
    Persist,
}

/// Whether this command's results are queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Delivery {
    Queue,
    Discard,
}

/// One raw policy bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Flag {
    Flush = 0x1,
    Persist = 0x2,
    Queue = 0x4,
    Discard = 0x8,
}

impl Flag {
    /// The flag's value in a policy bit mask.
    pub const fn bit(self) -> u8 {
        self as u8
    }
}

/// A legal combination of queue policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandFlags {
    retention: Retention,
    delivery: Delivery,
}

impl CommandFlags {
    /// Flush old responses and queue these ones.
    pub const DEFAULT: CommandFlags = CommandFlags::new(Retention::Flush, Delivery::Queue);
    /// Keep old responses and queue these ones too.
    pub const STASH: CommandFlags = CommandFlags::new(Retention::Persist, Delivery::Queue);
    /// Flush old responses and ignore this one.
    pub const CLEAR: CommandFlags = CommandFlags::new(Retention::Flush, Delivery::Discard);
    /// Keep old responses and ignore this one.
    pub const VOID: CommandFlags = CommandFlags::new(Retention::Persist, Delivery::Discard);

    /// Combines one choice from each axis.
    pub const fn new(retention: Retention, delivery: Delivery) -> Self {
        CommandFlags {
            retention,
            delivery,
        }
    }

    /// What happens to already queued responses.
    pub const fn retention(self) -> Retention {
        self.retention
    }

    /// Whether this command's results are queued.
    pub const fn delivery(self) -> Delivery {
        self.delivery
    }

    /// True when the queue is cleared before sending.
    pub const fn flushes(self) -> bool {
        matches!(self.retention, Retention::Flush)
    }

    /// True when results are pushed onto the queue.
    pub const fn queues(self) -> bool {
        matches!(self.delivery, Delivery::Queue)
    }

    /// Builds a policy from raw flags.
    ///
    /// An axis with no flag set takes its `DEFAULT` value, so an empty set is
    /// `DEFAULT`.
    pub fn from_flags(flags: &[Flag]) -> Result<Self, PolicyConflict> {
        Self::from_bits(flags.iter().fold(0, |bits, flag| bits | flag.bit()))
    }

    /// Builds a policy from a bit mask of [`Flag`] values.
    ///
    /// Bits outside the four flags are ignored.
    pub fn from_bits(bits: u8) -> Result<Self, PolicyConflict> {
        let has = |flag: Flag| bits & flag.bit() != 0;

        let retention = match (has(Flag::Flush), has(Flag::Persist)) {
            (true, true) => return Err(PolicyConflict::FlushAndPersist),
            (false, true) => Retention::Persist,
            _ => Retention::Flush,
        };
        let delivery = match (has(Flag::Queue), has(Flag::Discard)) {
            (true, true) => return Err(PolicyConflict::QueueAndDiscard),
            (false, true) => Delivery::Discard,
            _ => Delivery::Queue,
        };
        Ok(CommandFlags::new(retention, delivery))
    }

    /// Bit mask form, e.g. `5` for `DEFAULT`.
    pub fn bits(self) -> u8 {
        let retention = match self.retention {
            Retention::Flush => Flag::Flush,
            Retention::Persist => Flag::Persist,
        };
        let delivery = match self.delivery {
            Delivery::Queue => Flag::Queue,
            Delivery::Discard => Flag::Discard,
        };
        retention.bit() | delivery.bit()
    }
}

impl Default for CommandFlags {
    fn default() -> Self {
        CommandFlags::DEFAULT
    }
}

impl fmt::Display for CommandFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match (self.retention, self.delivery) {
            (Retention::Flush, Delivery::Queue) => "DEFAULT",
            (Retention::Persist, Delivery::Queue) => "STASH",
            (Retention::Flush, Delivery::Discard) => "CLEAR",
            (Retention::Persist, Delivery::Discard) => "VOID",
        };
        f.write_str(name)
    }
}

/// Parses a policy name (`"stash"`) or a `|`-separated flag list
/// (`"persist|queue"`), case-insensitively.
impl FromStr for CommandFlags {
    type Err = PolicyConflict;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut flags = Vec::new();
        for token in s.split('|').map(str::trim).filter(|token| !token.is_empty()) {
            match token.to_ascii_uppercase().as_str() {
                "DEFAULT" | "NONE" => {}
                "STASH" => flags.extend([Flag::Persist, Flag::Queue]),
                "CLEAR" => flags.extend([Flag::Flush, Flag::Discard]),
                "VOID" => flags.extend([Flag::Persist, Flag::Discard]),
                "FLUSH" => flags.push(Flag::Flush),
                "PERSIST" => flags.push(Flag::Persist),
                "QUEUE" => flags.push(Flag::Queue),
                "DISCARD" => flags.push(Flag::Discard),
                _ => return Err(PolicyConflict::UnknownFlag(token.to_string())),
            }
        }
        CommandFlags::from_flags(&flags)
    }
}
