use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::KinvaultError;

macro_rules! row_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

row_id!(
    /// Primary key of a user row
    UserId
);
row_id!(
    /// Primary key of a family row
    FamilyId
);
row_id!(
    /// Primary key of a milestone, note, or to-do row
    RecordId
);

/// Role label of a family member.
///
/// Purely organisational: every member can decrypt everything wrapped for the
/// family regardless of role. Ownership comes from creating the family.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[serde(alias = "男主人")]
    Husband,
    #[serde(alias = "女主人")]
    Wife,
    #[default]
    #[serde(alias = "儿子")]
    Son,
    #[serde(alias = "女儿")]
    Daughter,
    #[serde(alias = "爸爸")]
    Father,
    #[serde(alias = "妈妈")]
    Mother,
    #[serde(alias = "岳父")]
    FatherInLaw,
    #[serde(alias = "岳母")]
    MotherInLaw,
}

impl Role {
    pub const ALL: [Role; 8] = [
        Role::Husband,
        Role::Wife,
        Role::Son,
        Role::Daughter,
        Role::Father,
        Role::Mother,
        Role::FatherInLaw,
        Role::MotherInLaw,
    ];

    /// Roles a user may take when founding a family
    pub fn is_household_head(self) -> bool {
        matches!(self, Role::Husband | Role::Wife)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Husband => "husband",
            Role::Wife => "wife",
            Role::Son => "son",
            Role::Daughter => "daughter",
            Role::Father => "father",
            Role::Mother => "mother",
            Role::FatherInLaw => "father_in_law",
            Role::MotherInLaw => "mother_in_law",
        }
    }

    fn legacy_label(self) -> &'static str {
        match self {
            Role::Husband => "男主人",
            Role::Wife => "女主人",
            Role::Son => "儿子",
            Role::Daughter => "女儿",
            Role::Father => "爸爸",
            Role::Mother => "妈妈",
            Role::FatherInLaw => "岳父",
            Role::MotherInLaw => "岳母",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = KinvaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().replace('-', "_").to_lowercase();
        Role::ALL
            .into_iter()
            .find(|r| r.as_str() == wanted || r.legacy_label() == s.trim())
            .ok_or_else(|| KinvaultError::InvalidRole(s.to_string()))
    }
}

/// Category of a note (clear-text so the server can filter on it)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteCategory {
    #[default]
    #[serde(alias = "地址信息")]
    Address,
    #[serde(alias = "药方")]
    Prescription,
}

impl fmt::Display for NoteCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NoteCategory::Address => "address",
            NoteCategory::Prescription => "prescription",
        })
    }
}

impl FromStr for NoteCategory {
    type Err = KinvaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "address" | "地址信息" => Ok(NoteCategory::Address),
            "prescription" | "药方" => Ok(NoteCategory::Prescription),
            _ => Err(KinvaultError::InvalidCategory(s.to_string())),
        }
    }
}

/// Category of a to-do item
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoCategory {
    #[default]
    #[serde(alias = "生活")]
    Life,
    #[serde(alias = "学习")]
    Study,
    #[serde(alias = "运动")]
    Exercise,
    #[serde(alias = "心愿")]
    Wish,
}

impl fmt::Display for TodoCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TodoCategory::Life => "life",
            TodoCategory::Study => "study",
            TodoCategory::Exercise => "exercise",
            TodoCategory::Wish => "wish",
        })
    }
}

impl FromStr for TodoCategory {
    type Err = KinvaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "life" | "生活" => Ok(TodoCategory::Life),
            "study" | "学习" => Ok(TodoCategory::Study),
            "exercise" | "运动" => Ok(TodoCategory::Exercise),
            "wish" | "心愿" => Ok(TodoCategory::Wish),
            _ => Err(KinvaultError::InvalidCategory(s.to_string())),
        }
    }
}

/// The three record shapes that carry family-key ciphertext
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Milestone,
    Note,
    Todo,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RecordKind::Milestone => "milestone",
            RecordKind::Note => "note",
            RecordKind::Todo => "todo",
        })
    }
}
