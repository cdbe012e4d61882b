//! Pure RFM scoring and segment assignment.
//!
//! # Invariants
//! - Scores are in `1..=5`; the best value in a population always scores 5.
//! - Equal values always receive equal scores.
//! - Segment assignment depends only on the `(r, f, m)` tuple.

use serde::{Deserialize, Serialize};

pub const MAX_SCORE: u8 = 5;

/// Customer segment derived from an RFM score tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Segment {
    Champions,
    LoyalCustomers,
    PotentialLoyalists,
    NewCustomers,
    NeedAttention,
    AboutToSleep,
    AtRisk,
    CantLoseThem,
    Hibernating,
    Lost,
}

impl Segment {
    pub const ALL: [Segment; 10] = [
        Segment::Champions,
        Segment::LoyalCustomers,
        Segment::PotentialLoyalists,
        Segment::NewCustomers,
        Segment::NeedAttention,
        Segment::AboutToSleep,
        Segment::AtRisk,
        Segment::CantLoseThem,
        Segment::Hibernating,
        Segment::Lost,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Champions => "Champions",
            Self::LoyalCustomers => "Loyal Customers",
            Self::PotentialLoyalists => "Potential Loyalists",
            Self::NewCustomers => "New Customers",
            Self::NeedAttention => "Need Attention",
            Self::AboutToSleep => "About To Sleep",
            Self::AtRisk => "At Risk",
            Self::CantLoseThem => "Can't Lose Them",
            Self::Hibernating => "Hibernating",
            Self::Lost => "Lost",
        }
    }
}

/// Score triple, each component in `1..=5`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RfmScore {
    pub r: u8,
    pub f: u8,
    pub m: u8,
}

impl RfmScore {
    /// Frequency/monetary average, rounded up.
    pub fn fm(self) -> u8 {
        fm_score(self.f, self.m)
    }

    pub fn segment(self) -> Segment {
        segment_for(self.r, self.f, self.m)
    }
}

/// Maps a score tuple to its segment. Scores outside `1..=5` are clamped.
pub fn segment_for(r: u8, f: u8, m: u8) -> Segment {
    match (clamp_score(r), fm_score(f, m)) {
        (4.., 4..) => Segment::Champions,
        (4.., 2..=3) => Segment::PotentialLoyalists,
        (4.., _) => Segment::NewCustomers,
        (3, 4..) => Segment::LoyalCustomers,
        (3, 2..=3) => Segment::NeedAttention,
        (3, _) => Segment::AboutToSleep,
        (2, 4..) => Segment::AtRisk,
        (2, _) => Segment::Hibernating,
        (_, 4..) => Segment::CantLoseThem,
        _ => Segment::Lost,
    }
}

fn clamp_score(score: u8) -> u8 {
    score.clamp(1, MAX_SCORE)
}

fn fm_score(f: u8, m: u8) -> u8 {
    (clamp_score(f) + clamp_score(m) + 1) / 2
}

/// Raw per-customer values fed into scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RfmValues {
    pub recency_days: i64,
    pub frequency: u64,
    pub monetary: i64,
}

/// Scores every entry against the whole population.
///
/// A value scores `ceil(5 * k / n)` where `k` counts entries that are not
/// better than it (itself included). Lower recency is better; higher
/// frequency and monetary are better.
pub fn score_population(values: &[RfmValues]) -> Vec<RfmScore> {
    let n = values.len();
    if n == 0 {
        return Vec::new();
    }

    let mut recencies: Vec<i64> = values.iter().map(|v| v.recency_days).collect();
    let mut frequencies: Vec<u64> = values.iter().map(|v| v.frequency).collect();
    let mut monetaries: Vec<i64> = values.iter().map(|v| v.monetary).collect();
    recencies.sort_unstable();
    frequencies.sort_unstable();
    monetaries.sort_unstable();

    values
        .iter()
        .map(|value| {
            let recency_not_better = n - recencies.partition_point(|&r| r < value.recency_days);
            let frequency_not_better = frequencies.partition_point(|&f| f <= value.frequency);
            let monetary_not_better = monetaries.partition_point(|&m| m <= value.monetary);
            RfmScore {
                r: quintile(recency_not_better, n),
                f: quintile(frequency_not_better, n),
                m: quintile(monetary_not_better, n),
            }
        })
        .collect()
}

fn quintile(not_better: usize, n: usize) -> u8 {
    let score = (usize::from(MAX_SCORE) * not_better + n - 1) / n;
    score.clamp(1, usize::from(MAX_SCORE)) as u8
}

#[cfg(test)]
mod tests {
    use super::{score_population, segment_for, RfmScore, RfmValues, Segment};

    fn values(recency_days: i64, frequency: u64, monetary: i64) -> RfmValues {
        RfmValues {
            recency_days,
            frequency,
            monetary,
        }
    }

    #[test]
    fn five_distinct_customers_spread_over_all_quintiles() {
        let population = vec![
            values(1, 10, 500),
            values(5, 8, 400),
            values(10, 6, 300),
            values(20, 4, 200),
            values(40, 2, 100),
        ];
        let scores = score_population(&population);
        let expected = [5, 4, 3, 2, 1];
        for (score, want) in scores.iter().zip(expected) {
            assert_eq!(*score, RfmScore { r: want, f: want, m: want });
        }
    }

    #[test]
    fn ties_share_a_score() {
        let population = vec![values(3, 2, 100), values(3, 2, 100), values(9, 1, 50)];
        let scores = score_population(&population);
        assert_eq!(scores[0], scores[1]);
        assert_eq!(scores[0], RfmScore { r: 5, f: 5, m: 5 });
        assert_eq!(scores[2], RfmScore { r: 2, f: 2, m: 2 });
    }

    #[test]
    fn single_customer_scores_top_and_empty_population_is_empty() {
        assert!(score_population(&[]).is_empty());
        let scores = score_population(&[values(100, 1, 10)]);
        assert_eq!(scores, vec![RfmScore { r: 5, f: 5, m: 5 }]);
    }

    #[test]
    fn segment_grid_boundaries() {
        assert_eq!(segment_for(5, 5, 5), Segment::Champions);
        assert_eq!(segment_for(4, 4, 3), Segment::Champions);
        assert_eq!(segment_for(4, 3, 2), Segment::PotentialLoyalists);
        assert_eq!(segment_for(5, 1, 1), Segment::NewCustomers);
        assert_eq!(segment_for(3, 5, 4), Segment::LoyalCustomers);
        assert_eq!(segment_for(3, 2, 2), Segment::NeedAttention);
        assert_eq!(segment_for(3, 1, 1), Segment::AboutToSleep);
        assert_eq!(segment_for(2, 5, 5), Segment::AtRisk);
        assert_eq!(segment_for(2, 3, 3), Segment::Hibernating);
        assert_eq!(segment_for(1, 4, 4), Segment::CantLoseThem);
        assert_eq!(segment_for(1, 1, 2), Segment::Lost);
    }

    #[test]
    fn segment_is_a_pure_function_of_scores() {
        for r in 1..=5 {
            for f in 1..=5 {
                for m in 1..=5 {
                    let score = RfmScore { r, f, m };
                    assert_eq!(score.segment(), segment_for(r, f, m));
                    assert_eq!(score.segment(), score.segment());
                    assert!(score.fm() >= 1 && score.fm() <= 5);
                }
            }
        }
    }

    #[test]
    fn out_of_range_scores_are_clamped() {
        assert_eq!(segment_for(5, 200, 200), Segment::Champions);
        assert_eq!(segment_for(255, 255, 255), segment_for(5, 5, 5));
        assert_eq!(segment_for(0, 0, 0), segment_for(1, 1, 1));
        let score = RfmScore {
            r: 9,
            f: u8::MAX,
            m: u8::MAX,
        };
        assert_eq!(score.fm(), 5);
        assert_eq!(score.segment(), Segment::Champions);
    }
}
