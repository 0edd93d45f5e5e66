use crate::api::{Clip, Comment, VoteDirection};

/// Computes the vote a user ends up with, and the resulting change in score, when they
/// press `requested` while currently having voted `current`
///
/// Pressing the same direction again removes the vote, pressing the opposite direction
/// switches it.
pub fn transition(
    current: Option<VoteDirection>,
    requested: VoteDirection,
) -> (Option<VoteDirection>, i64) {
    match current {
        Some(c) if c == requested => (None, -requested.value()),
        None => (Some(requested), requested.value()),
        Some(c) => (Some(requested), -c.value() + requested.value()),
    }
}

/// Entities carrying a score and the current user's vote
pub trait Votable {
    fn vote_score(&mut self) -> &mut i64;
    fn user_vote(&mut self) -> &mut Option<VoteDirection>;

    /// Applies `transition` in place, returning the new vote
    fn apply_vote(&mut self, requested: VoteDirection) -> Option<VoteDirection> {
        let (new_vote, delta) = transition(*self.user_vote(), requested);
        *self.vote_score() += delta;
        *self.user_vote() = new_vote;
        new_vote
    }

    /// Sets the vote to `new`, moving the score by the difference with the previous vote
    fn set_vote(&mut self, new: Option<VoteDirection>) {
        let value = |v: Option<VoteDirection>| v.map(|v| v.value()).unwrap_or(0);
        *self.vote_score() += value(new) - value(*self.user_vote());
        *self.user_vote() = new;
    }
}

impl Votable for Comment {
    fn vote_score(&mut self) -> &mut i64 {
        &mut self.vote_score
    }

    fn user_vote(&mut self) -> &mut Option<VoteDirection> {
        &mut self.user_vote
    }
}

impl Votable for Clip {
    fn vote_score(&mut self) -> &mut i64 {
        &mut self.vote_score
    }

    fn user_vote(&mut self) -> &mut Option<VoteDirection> {
        &mut self.user_vote
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use VoteDirection::*;

    #[test]
    fn transitions() {
        assert_eq!(transition(None, Up), (Some(Up), 1));
        assert_eq!(transition(None, Down), (Some(Down), -1));
        assert_eq!(transition(Some(Up), Up), (None, -1));
        assert_eq!(transition(Some(Down), Down), (None, 1));
        assert_eq!(transition(Some(Down), Up), (Some(Up), 2));
        assert_eq!(transition(Some(Up), Down), (Some(Down), -2));
    }

    #[test]
    fn setting_a_vote_moves_score_by_difference() {
        let mut clip = crate::api::Clip {
            id: crate::api::ClipId::stub(),
            title: String::from("clip"),
            vote_score: 5,
            user_vote: Some(Down),
            comment_count: 0,
            created_at: chrono::Utc::now(),
        };
        clip.set_vote(Some(Up));
        assert_eq!((clip.vote_score, clip.user_vote), (7, Some(Up)));
        clip.set_vote(None);
        assert_eq!((clip.vote_score, clip.user_vote), (6, None));
    }
}
