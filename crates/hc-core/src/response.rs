//! Response types exchanged between the simulation and a test article.
//!
//! Every scalar signal carries one of five response types. Per-type arrays
//! (`ResponseSizes`, filter banks, response vectors) are indexed by
//! [`ResponseType::index`], so the ordering of the variants is load-bearing.

use core::fmt;
use core::ops::{Index, IndexMut};

use crate::error::{CoreError, CoreResult};

/// Kind of response a signal represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ResponseType {
    #[cfg_attr(feature = "serde", serde(alias = "displacement"))]
    Disp,
    #[cfg_attr(feature = "serde", serde(alias = "velocity"))]
    Vel,
    #[cfg_attr(feature = "serde", serde(alias = "acceleration"))]
    Accel,
    Force,
    Time,
}

impl ResponseType {
    /// Number of response types.
    pub const COUNT: usize = 5;

    /// All response types in index order.
    pub const ALL: [ResponseType; Self::COUNT] = [
        ResponseType::Disp,
        ResponseType::Vel,
        ResponseType::Accel,
        ResponseType::Force,
        ResponseType::Time,
    ];

    /// 0-based slot of this type in per-type arrays.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Inverse of [`ResponseType::index`].
    ///
    /// Accepts a signed value because configuration sources may carry
    /// arbitrary integers; anything outside `0..5` is rejected.
    pub fn from_index(index: i64) -> CoreResult<Self> {
        usize::try_from(index)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
            .ok_or(CoreError::UnknownResponseType { index })
    }

    /// Short name used in recorder output and log messages.
    pub fn name(self) -> &'static str {
        match self {
            ResponseType::Disp => "disp",
            ResponseType::Vel => "vel",
            ResponseType::Accel => "accel",
            ResponseType::Force => "force",
            ResponseType::Time => "time",
        }
    }
}

impl fmt::Display for ResponseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Number of scalar components per response type.
///
/// Used both for the sizes a simulation passes/expects (`sizeCtrl`/`sizeDaq`)
/// and for the sizes implied by a list of control points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ResponseSizes([usize; ResponseType::COUNT]);

impl ResponseSizes {
    /// All sizes zero.
    pub const fn zero() -> Self {
        Self([0; ResponseType::COUNT])
    }

    /// Sizes in index order `[disp, vel, accel, force, time]`.
    pub const fn from_array(sizes: [usize; ResponseType::COUNT]) -> Self {
        Self(sizes)
    }

    pub fn as_array(&self) -> [usize; ResponseType::COUNT] {
        self.0
    }

    pub fn get(&self, rsp: ResponseType) -> usize {
        self.0[rsp.index()]
    }

    /// Builder-style setter.
    pub fn with(mut self, rsp: ResponseType, size: usize) -> Self {
        self.0[rsp.index()] = size;
        self
    }

    /// Sum over all response types.
    pub fn total(&self) -> usize {
        self.0.iter().sum()
    }

    /// Iterate `(type, size)` pairs in index order.
    pub fn iter(&self) -> impl Iterator<Item = (ResponseType, usize)> + '_ {
        ResponseType::ALL.iter().map(move |&r| (r, self.0[r.index()]))
    }

    /// First response type whose `required` size exceeds this one.
    ///
    /// Types with a required size of zero are unused and never fall short.
    pub fn first_shortfall(&self, required: &ResponseSizes) -> Option<ResponseType> {
        ResponseType::ALL
            .into_iter()
            .find(|&r| required.get(r) != 0 && required.get(r) > self.get(r))
    }
}

impl Index<ResponseType> for ResponseSizes {
    type Output = usize;

    fn index(&self, rsp: ResponseType) -> &usize {
        &self.0[rsp.index()]
    }
}

impl IndexMut<ResponseType> for ResponseSizes {
    fn index_mut(&mut self, rsp: ResponseType) -> &mut usize {
        &mut self.0[rsp.index()]
    }
}

impl fmt::Display for ResponseSizes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.iter().map(|(r, n)| format!("{r}={n}")).collect();
        write!(f, "[{}]", parts.join(", "))
    }
}
