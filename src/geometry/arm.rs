//! 机械臂标签：left / right，支持取对侧

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// 标识计划段作用于哪一只机械臂
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArmTag {
    Left,
    Right,
}

impl ArmTag {
    pub const BOTH: [ArmTag; 2] = [ArmTag::Left, ArmTag::Right];

    /// 对侧机械臂（left ↔ right）
    pub fn opposite(self) -> Self {
        match self {
            ArmTag::Left => ArmTag::Right,
            ArmTag::Right => ArmTag::Left,
        }
    }

    /// 按物体所在的 x 坐标选臂：x < 0 用左臂，否则右臂
    pub fn nearest_to(x: f64) -> Self {
        if x < 0.0 {
            ArmTag::Left
        } else {
            ArmTag::Right
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ArmTag::Left => "left",
            ArmTag::Right => "right",
        }
    }

    /// 数组下标（left = 0, right = 1）
    pub fn index(self) -> usize {
        match self {
            ArmTag::Left => 0,
            ArmTag::Right => 1,
        }
    }
}

impl fmt::Display for ArmTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArmTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "left" => Ok(ArmTag::Left),
            "right" => Ok(ArmTag::Right),
            other => Err(format!("unknown arm tag: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opposite_is_involution() {
        for arm in ArmTag::BOTH {
            assert_ne!(arm, arm.opposite());
            assert_eq!(arm, arm.opposite().opposite());
        }
    }

    #[test]
    fn test_parse_and_display() {
        assert_eq!("Left".parse::<ArmTag>().unwrap(), ArmTag::Left);
        assert_eq!(ArmTag::Right.to_string(), "right");
        assert!("middle".parse::<ArmTag>().is_err());
    }

    #[test]
    fn test_nearest_to() {
        assert_eq!(ArmTag::nearest_to(-0.1), ArmTag::Left);
        assert_eq!(ArmTag::nearest_to(0.2), ArmTag::Right);
    }
}
