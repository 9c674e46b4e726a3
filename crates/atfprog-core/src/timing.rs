//! Programming delays
//!
//! All values are minimums from the ATF22V10 programming specification.
//! Longer delays are always safe; shorter ones risk incompletely programmed
//! fuses, so a [`Timing`] below [`Timing::MINIMUM`] is rejected.

use core::time::Duration;

use crate::error::{Error, Result};

/// Delays used by the programming sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// Settle time around entering and leaving programming mode
    pub mode_settle: Duration,
    /// Settle time before and after the erase strobe
    pub erase_settle: Duration,
    /// Width of the erase strobe
    pub erase_strobe: Duration,
    /// Width of the strobe committing a row or the OLMC word
    pub row_strobe: Duration,
    /// Settle time after each row strobe
    pub row_settle: Duration,
}

impl Timing {
    /// Datasheet minimums
    pub const MINIMUM: Timing = Timing {
        mode_settle: Duration::from_millis(5),
        erase_settle: Duration::from_millis(10),
        erase_strobe: Duration::from_millis(30),
        row_strobe: Duration::from_millis(5),
        row_settle: Duration::from_millis(10),
    };

    /// Check every delay against its minimum
    pub fn validate(&self) -> Result<()> {
        let min = Self::MINIMUM;
        let ok = self.mode_settle >= min.mode_settle
            && self.erase_settle >= min.erase_settle
            && self.erase_strobe >= min.erase_strobe
            && self.row_strobe >= min.row_strobe
            && self.row_settle >= min.row_settle;
        if ok {
            Ok(())
        } else {
            Err(Error::TimingBelowMinimum)
        }
    }

    /// Lower bound on the time one full programming run spends waiting
    pub fn total_wait(&self, rows: usize) -> Duration {
        // enter + exit mode, erase, one strobe+settle per row, OLMC, power-down row
        let per_row = self.row_strobe + self.row_settle;
        self.mode_settle * 4
            + self.erase_settle * 2
            + self.erase_strobe
            + per_row * (rows as u32 + 2)
    }
}

impl Default for Timing {
    fn default() -> Self {
        Self::MINIMUM
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_minimum() {
        assert_eq!(Timing::default(), Timing::MINIMUM);
        assert!(Timing::default().validate().is_ok());
    }

    #[test]
    fn test_longer_delays_accepted() {
        let timing = Timing {
            row_settle: Duration::from_millis(50),
            ..Timing::MINIMUM
        };
        assert!(timing.validate().is_ok());
    }

    #[test]
    fn test_shorter_delays_rejected() {
        let timing = Timing {
            erase_strobe: Duration::from_millis(29),
            ..Timing::MINIMUM
        };
        assert_eq!(timing.validate(), Err(Error::TimingBelowMinimum));
    }

    #[test]
    fn test_total_wait() {
        // 4*5 + 2*10 + 30 + (44 + 2) * 15
        assert_eq!(
            Timing::MINIMUM.total_wait(44),
            Duration::from_millis(20 + 20 + 30 + 46 * 15)
        );
    }
}
