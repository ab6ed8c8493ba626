use std::fmt;

/// Axes a specimen stage can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StageAxis {
    /// X translation (mm)
    X,
    /// Y translation (mm)
    Y,
    /// Z translation (mm)
    Z,
    /// Rotation (degrees)
    R,
    /// Tilt (degrees)
    T,
    /// Specimen bank / holder index
    B,
}

impl StageAxis {
    pub const ALL: [StageAxis; 6] = [
        StageAxis::X,
        StageAxis::Y,
        StageAxis::Z,
        StageAxis::R,
        StageAxis::T,
        StageAxis::B,
    ];

    #[inline]
    const fn index(self) -> usize {
        self as usize
    }

    pub const fn name(self) -> &'static str {
        match self {
            StageAxis::X => "X",
            StageAxis::Y => "Y",
            StageAxis::Z => "Z",
            StageAxis::R => "R",
            StageAxis::T => "T",
            StageAxis::B => "B",
        }
    }
}

/// Sparse stage coordinate. An axis that was never set is absent, which is
/// not the same as zero.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StagePosition {
    axes: [Option<f64>; 6],
}

impl StagePosition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, axis: StageAxis, value: f64) -> Self {
        self.set(axis, value);
        self
    }

    /// Set an axis. Non-finite values are ignored.
    pub fn set(&mut self, axis: StageAxis, value: f64) {
        if value.is_finite() {
            self.axes[axis.index()] = Some(value);
        }
    }

    pub fn clear(&mut self, axis: StageAxis) {
        self.axes[axis.index()] = None;
    }

    #[inline]
    pub fn get(&self, axis: StageAxis) -> Option<f64> {
        self.axes[axis.index()]
    }

    pub fn is_empty(&self) -> bool {
        self.axes.iter().all(Option::is_none)
    }

    /// Axes that carry a value, in X, Y, Z, R, T, B order.
    pub fn axes(&self) -> impl Iterator<Item = (StageAxis, f64)> + '_ {
        StageAxis::ALL
            .into_iter()
            .filter_map(move |a| self.get(a).map(|v| (a, v)))
    }
}

impl fmt::Display for StagePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .axes()
            .map(|(a, v)| format!("{}={}", a.name(), v))
            .collect();
        write!(f, "[{}]", parts.join(", "))
    }
}
