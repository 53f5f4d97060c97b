//! Reward table
//!
//! Maps engagement triggers to reward points. Only "like" awards points
//! today; the table keeps the mapping in one place as triggers grow.

use crate::db::schemas::RewardDoc;

/// Points awarded for a trigger
pub fn point_amount(trigger: &str) -> i64 {
    match trigger {
        "idea_like" => 1,
        _ => 0,
    }
}

/// Build the reward record for a trigger, if the trigger pays anything
pub fn reward_for(trigger: &str) -> Option<RewardDoc> {
    let value = point_amount(trigger);
    if value == 0 {
        return None;
    }

    let title = match trigger {
        "idea_like" => "Liked an idea",
        _ => "Engagement reward",
    };

    Some(RewardDoc::points(title, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pays_one_point() {
        assert_eq!(point_amount("idea_like"), 1);

        let reward = reward_for("idea_like").unwrap();
        assert_eq!(reward.kind, "points");
        assert_eq!(reward.value, 1);
        assert!(!reward.redeemed);
    }

    #[test]
    fn test_unknown_trigger_pays_nothing() {
        assert_eq!(point_amount("idea_view"), 0);
        assert!(reward_for("idea_view").is_none());
    }
}
