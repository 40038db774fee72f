use time::{OffsetDateTime, UtcOffset};

/// MS-DOS date and time as stored in local and central headers.
///
/// Two-second resolution, years 1980 through 2107, no timezone (UTC is used).
/// Timestamps outside the representable range are clamped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DosDateTime {
    pub time: u16,
    pub date: u16,
}

impl DosDateTime {
    /// 1980-01-01 00:00:00, the earliest representable timestamp.
    pub const EPOCH: DosDateTime = DosDateTime { time: 0, date: (1 << 5) | 1 };
    /// 2107-12-31 23:59:58, the latest representable timestamp.
    pub const MAX: DosDateTime = DosDateTime {
        time: (23 << 11) | (59 << 5) | 29,
        date: (127 << 9) | (12 << 5) | 31,
    };
}

impl Default for DosDateTime {
    fn default() -> Self {
        Self::EPOCH
    }
}

impl From<OffsetDateTime> for DosDateTime {
    fn from(value: OffsetDateTime) -> Self {
        let utc = value.to_offset(UtcOffset::UTC);
        match utc.year() {
            ..1980 => Self::EPOCH,
            2108.. => Self::MAX,
            year => Self {
                time: (u16::from(utc.hour()) << 11) | (u16::from(utc.minute()) << 5) | (u16::from(utc.second()) / 2),
                // Infallible: the match arm bounds the year to 1980..=2107.
                date: ((year - 1980) as u16) << 9 | (u16::from(u8::from(utc.month())) << 5) | u16::from(utc.day()),
            },
        }
    }
}
