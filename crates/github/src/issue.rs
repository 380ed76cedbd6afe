use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// An issue or pull request, written `owner/repo#number`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IssueRef {
    pub owner: String,
    pub repo: String,
    pub number: u64,
}

impl FromStr for IssueRef {
    type Err = Error;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let (slug, number) = input
            .rsplit_once('#')
            .ok_or_else(|| Error::invalid_issue_ref(input, "missing '#number'"))?;
        let (owner, repo) = slug
            .split_once('/')
            .ok_or_else(|| Error::invalid_issue_ref(input, "expected 'owner/repo'"))?;

        if owner.is_empty() || repo.is_empty() || repo.contains('/') {
            return Err(Error::invalid_issue_ref(input, "expected 'owner/repo'"));
        }

        let number: u64 = number
            .parse()
            .map_err(|_| Error::invalid_issue_ref(input, "number is not a positive integer"))?;
        if number == 0 {
            return Err(Error::invalid_issue_ref(input, "number must be positive"));
        }

        Ok(Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
            number,
        })
    }
}

impl TryFrom<String> for IssueRef {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<IssueRef> for String {
    fn from(value: IssueRef) -> Self {
        value.to_string()
    }
}

impl fmt::Display for IssueRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}#{}", self.owner, self.repo, self.number)
    }
}
