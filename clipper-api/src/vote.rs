use crate::Error;

/// Direction of a user vote on a votable entity
///
/// On the wire a vote is an integer: `1` for an upvote, `-1` for a downvote, and `0` (or
/// `null`) for no vote at all.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(into = "i16", try_from = "i16")]
pub enum VoteDirection {
    Up,
    Down,
}

impl VoteDirection {
    pub fn value(self) -> i64 {
        match self {
            VoteDirection::Up => 1,
            VoteDirection::Down => -1,
        }
    }

    /// Integer sent to the backend for the vote a user ends up with
    pub fn wire_value(vote: Option<VoteDirection>) -> i16 {
        match vote {
            Some(VoteDirection::Up) => 1,
            Some(VoteDirection::Down) => -1,
            None => 0,
        }
    }
}

impl From<VoteDirection> for i16 {
    fn from(v: VoteDirection) -> i16 {
        VoteDirection::wire_value(Some(v))
    }
}

impl TryFrom<i16> for VoteDirection {
    type Error = Error;

    fn try_from(v: i16) -> Result<VoteDirection, Error> {
        match v {
            1 => Ok(VoteDirection::Up),
            -1 => Ok(VoteDirection::Down),
            v => Err(Error::InvalidVote(v)),
        }
    }
}

/// Parse the `user_vote` field as sent by the backend, where `0` means no vote
pub(crate) mod wire_vote {
    use serde::{Deserialize, Deserializer, Serializer};

    use super::VoteDirection;

    pub fn serialize<S: Serializer>(v: &Option<VoteDirection>, s: S) -> Result<S::Ok, S::Error> {
        match v {
            Some(v) => s.serialize_i16((*v).into()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<VoteDirection>, D::Error> {
        match Option::<i16>::deserialize(d)? {
            None | Some(0) => Ok(None),
            Some(v) => VoteDirection::try_from(v)
                .map(Some)
                .map_err(serde::de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, serde::Deserialize, serde::Serialize)]
    struct Voted {
        #[serde(with = "wire_vote", default)]
        user_vote: Option<VoteDirection>,
    }

    #[test]
    fn zero_and_null_mean_no_vote() {
        let zero: Voted = serde_json::from_str(r#"{"user_vote":0}"#).unwrap();
        let null: Voted = serde_json::from_str(r#"{"user_vote":null}"#).unwrap();
        let missing: Voted = serde_json::from_str("{}").unwrap();
        assert_eq!(zero.user_vote, None);
        assert_eq!(null.user_vote, None);
        assert_eq!(missing.user_vote, None);
    }

    #[test]
    fn directions_use_signed_integers() {
        let down: Voted = serde_json::from_str(r#"{"user_vote":-1}"#).unwrap();
        assert_eq!(down.user_vote, Some(VoteDirection::Down));
        assert_eq!(
            serde_json::to_string(&Voted {
                user_vote: Some(VoteDirection::Up)
            })
            .unwrap(),
            r#"{"user_vote":1}"#
        );
        assert!(serde_json::from_str::<Voted>(r#"{"user_vote":2}"#).is_err());
    }
}
