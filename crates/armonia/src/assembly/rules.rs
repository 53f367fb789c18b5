//! Vote counting and approval rules for assembly votings.

use std::collections::BTreeMap;

use super::domain::{OptionTally, PercentageBase, Vote, VotingType};

pub const YES: &str = "Sí";
pub const NO: &str = "No";
pub const ABSTAIN: &str = "Abstención";

const TOLERANCE: f64 = 1e-9;

pub fn default_options() -> Vec<String> {
    vec![YES.to_string(), NO.to_string(), ABSTAIN.to_string()]
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Tally {
    pub total_votes: u64,
    pub total_coefficient: f64,
    pub options: BTreeMap<String, OptionTally>,
}

impl Tally {
    fn option(&self, name: &str) -> OptionTally {
        self.options.get(name).copied().unwrap_or_default()
    }
}

/// Counts `votes`; every configured option appears, even without votes.
pub fn tally(options: &[String], votes: &[Vote]) -> Tally {
    let mut result: BTreeMap<String, OptionTally> = options
        .iter()
        .map(|option| (option.clone(), OptionTally::default()))
        .collect();
    let mut total_coefficient = 0.0;

    for vote in votes {
        let entry = result.entry(vote.value.clone()).or_default();
        entry.count += 1;
        entry.coefficient += vote.coefficient;
        total_coefficient += vote.coefficient;
    }

    Tally {
        total_votes: votes.len() as u64,
        total_coefficient,
        options: result,
    }
}

/// Share of `part` over `base` as a percentage; zero when the base is empty.
pub fn share(part: f64, base: f64) -> f64 {
    if base <= 0.0 {
        0.0
    } else {
        part / base * 100.0
    }
}

fn meets(part: f64, base: f64, required: Option<f64>) -> bool {
    match required {
        Some(required) if base > 0.0 => share(part, base) + TOLERANCE >= required,
        _ => false,
    }
}

/// Whether `tally` carries the voting.
///
/// `assembly_coefficient` is the assembly's required coefficient, the base of a
/// QUALIFIED_MAJORITY taken over total coefficients.
pub fn is_approved(
    voting_type: VotingType,
    required_percentage: Option<f64>,
    base: PercentageBase,
    assembly_coefficient: f64,
    tally: &Tally,
) -> bool {
    let yes = tally.option(YES);
    let no = tally.option(NO);

    match voting_type {
        VotingType::SimpleMajority => yes.count > no.count,
        VotingType::QualifiedMajority => {
            let base = match base {
                PercentageBase::VotedCoefficients => tally.total_coefficient,
                PercentageBase::TotalCoefficients => assembly_coefficient,
            };
            meets(yes.coefficient, base, required_percentage)
        }
        VotingType::Unanimous => tally.total_votes > 0 && no.count == 0,
        VotingType::CoefficientBased => {
            meets(yes.coefficient, tally.total_coefficient, required_percentage)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn vote(value: &str, coefficient: f64) -> Vote {
        Vote {
            id: 0,
            voting_id: 1,
            attendee_id: 0,
            user_id: 0,
            property_unit_id: 0,
            coefficient,
            value: value.to_string(),
            comments: None,
            ip_address: None,
            user_agent: None,
            cast_at: Utc::now(),
        }
    }

    #[test]
    fn tally_lists_every_option() {
        let result = tally(&default_options(), &[vote(YES, 12.5), vote(YES, 7.5)]);
        assert_eq!(result.total_votes, 2);
        assert_eq!(result.options.len(), 3);
        assert_eq!(result.options[YES].count, 2);
        assert!((result.options[YES].coefficient - 20.0).abs() < 1e-9);
        assert_eq!(result.options[NO].count, 0);
    }

    #[test]
    fn simple_majority_needs_more_yes_than_no() {
        let options = default_options();
        let approved = tally(&options, &[vote(YES, 10.0), vote(YES, 10.0), vote(NO, 30.0)]);
        assert!(is_approved(VotingType::SimpleMajority, None, PercentageBase::default(), 60.0, &approved));

        let tied = tally(&options, &[vote(YES, 10.0), vote(NO, 10.0)]);
        assert!(!is_approved(VotingType::SimpleMajority, None, PercentageBase::default(), 60.0, &tied));
    }

    #[test]
    fn simple_majority_treats_missing_no_option_as_zero() {
        let options = vec![YES.to_string(), ABSTAIN.to_string()];
        let result = tally(&options, &[vote(YES, 5.0)]);
        assert!(is_approved(VotingType::SimpleMajority, None, PercentageBase::default(), 60.0, &result));
    }

    #[test]
    fn qualified_majority_uses_selected_base() {
        let result = tally(
            &default_options(),
            &[vote(YES, 40.0), vote(NO, 10.0)],
        );
        assert!(is_approved(
            VotingType::QualifiedMajority,
            Some(70.0),
            PercentageBase::VotedCoefficients,
            100.0,
            &result
        ));
        assert!(!is_approved(
            VotingType::QualifiedMajority,
            Some(70.0),
            PercentageBase::TotalCoefficients,
            100.0,
            &result
        ));
    }

    #[test]
    fn total_base_is_the_assembly_coefficient() {
        let result = tally(&default_options(), &[vote(YES, 40.0), vote(NO, 10.0)]);
        assert!(is_approved(
            VotingType::QualifiedMajority,
            Some(70.0),
            PercentageBase::TotalCoefficients,
            50.0,
            &result
        ));
        assert!(!is_approved(
            VotingType::QualifiedMajority,
            Some(70.0),
            PercentageBase::TotalCoefficients,
            60.0,
            &result
        ));
        assert!(!is_approved(
            VotingType::QualifiedMajority,
            Some(70.0),
            PercentageBase::TotalCoefficients,
            0.0,
            &result
        ));
    }

    #[test]
    fn unanimous_allows_abstentions_but_not_no() {
        let options = default_options();
        let abstained = tally(&options, &[vote(YES, 10.0), vote(ABSTAIN, 5.0)]);
        assert!(is_approved(VotingType::Unanimous, None, PercentageBase::default(), 60.0, &abstained));

        let objected = tally(&options, &[vote(YES, 10.0), vote(NO, 1.0)]);
        assert!(!is_approved(VotingType::Unanimous, None, PercentageBase::default(), 60.0, &objected));

        let empty = tally(&options, &[]);
        assert!(!is_approved(VotingType::Unanimous, None, PercentageBase::default(), 60.0, &empty));
    }

    #[test]
    fn coefficient_based_rejects_empty_base() {
        let empty = tally(&default_options(), &[]);
        assert!(!is_approved(
            VotingType::CoefficientBased,
            Some(50.0),
            PercentageBase::default(),
            60.0,
            &empty
        ));

        let result = tally(&default_options(), &[vote(YES, 20.0), vote(YES, 20.0), vote(NO, 20.0)]);
        assert!(!is_approved(
            VotingType::CoefficientBased,
            Some(70.0),
            PercentageBase::default(),
            60.0,
            &result
        ));
        assert!(is_approved(
            VotingType::CoefficientBased,
            Some(66.0),
            PercentageBase::default(),
            60.0,
            &result
        ));
    }
}
