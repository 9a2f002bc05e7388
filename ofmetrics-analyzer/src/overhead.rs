use serde::Serialize;

use ofmetrics_controller::snapshot::OverheadTotals;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OverheadStats {
    pub headers: u64,
    pub payload: u64,
    /// Wider than the two totals so any loaded pair fits.
    pub total: u128,
    /// Header bytes as a percentage of all bytes, in `[0, 100]`.
    pub percentage: f64,
}

impl OverheadStats {
    /// `None` when no byte was ever counted.
    pub fn from_totals(totals: &OverheadTotals) -> Option<Self> {
        totals.percentage().map(|percentage| Self {
            headers: totals.total_headers,
            payload: totals.payload,
            total: totals.total(),
            percentage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_share() {
        let stats = OverheadStats::from_totals(&OverheadTotals { total_headers: 20, payload: 80 }).unwrap();
        assert_eq!(stats.total, 100);
        assert_eq!(stats.percentage, 20.0);
    }

    #[test]
    fn test_bounds() {
        assert_eq!(OverheadStats::from_totals(&OverheadTotals::default()), None);
        let all_headers = OverheadStats::from_totals(&OverheadTotals { total_headers: 40, payload: 0 }).unwrap();
        assert_eq!(all_headers.percentage, 100.0);
        let no_headers = OverheadStats::from_totals(&OverheadTotals { total_headers: 0, payload: 512 }).unwrap();
        assert_eq!(no_headers.percentage, 0.0);
    }

    #[test]
    fn test_huge_totals_from_a_document() {
        let stats = OverheadStats::from_totals(&OverheadTotals { total_headers: u64::MAX, payload: 1 }).unwrap();
        assert_eq!(stats.total, u128::from(u64::MAX) + 1);
        assert!(stats.percentage > 99.0 && stats.percentage <= 100.0);

        let stats = OverheadStats::from_totals(&OverheadTotals { total_headers: 1, payload: u64::MAX }).unwrap();
        assert!(stats.percentage >= 0.0 && stats.percentage < 1.0);
    }
}
