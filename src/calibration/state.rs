//! Calibration step sequencing.

use crate::automation::config::{ClickTarget, FeatureSet};

/// Steps in the calibration wizard.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CalibrationStep {
    Follow,
    Item,
    Return,
    Purchase,
    /// Top-left corner of the price region.
    RegionTopLeft,
    /// Bottom-right corner of the price region.
    RegionBottomRight,
    Threshold,
}

impl CalibrationStep {
    /// Ordered steps for a feature set.
    pub fn sequence(features: &FeatureSet) -> Vec<CalibrationStep> {
        let mut steps: Vec<CalibrationStep> = features
            .required_targets()
            .into_iter()
            .map(CalibrationStep::for_target)
            .collect();
        steps.extend([
            CalibrationStep::RegionTopLeft,
            CalibrationStep::RegionBottomRight,
            CalibrationStep::Threshold,
        ]);
        steps
    }

    fn for_target(target: ClickTarget) -> Self {
        match target {
            ClickTarget::Follow => Self::Follow,
            ClickTarget::Item => Self::Item,
            ClickTarget::Return => Self::Return,
            ClickTarget::Purchase => Self::Purchase,
        }
    }

    /// The click target captured by this step, if it is a button step.
    pub fn target(&self) -> Option<ClickTarget> {
        match self {
            Self::Follow => Some(ClickTarget::Follow),
            Self::Item => Some(ClickTarget::Item),
            Self::Return => Some(ClickTarget::Return),
            Self::Purchase => Some(ClickTarget::Purchase),
            _ => None,
        }
    }

    /// Returns a human-readable description of the step.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Follow => "Follow Coordinate",
            Self::Item => "Item Coordinate",
            Self::Return => "Return Coordinate",
            Self::Purchase => "Purchase Button Coordinate",
            Self::RegionTopLeft => "Price Region - TOP-LEFT corner",
            Self::RegionBottomRight => "Price Region - BOTTOM-RIGHT corner",
            Self::Threshold => "Threshold",
        }
    }

    /// What the operator should do for this step.
    pub fn instructions(&self) -> &'static str {
        match self {
            Self::Follow => "Move your mouse to the FOLLOW button.",
            Self::Item => "Move your mouse to the ITEM slot.",
            Self::Return => "Move your mouse to the RETURN button.",
            Self::Purchase => "Move your mouse to the PURCHASE button.",
            Self::RegionTopLeft => "Move your mouse to the TOP-LEFT corner of the price region.",
            Self::RegionBottomRight => {
                "Move your mouse to the BOTTOM-RIGHT corner of the price region."
            }
            Self::Threshold => "Enter the highest price you are willing to pay.",
        }
    }

    /// Step a redo restarts from. A region is always captured as a pair.
    pub fn rewind_to_step_start(&self) -> CalibrationStep {
        match self {
            Self::RegionBottomRight => Self::RegionTopLeft,
            other => *other,
        }
    }
}
