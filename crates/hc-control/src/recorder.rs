//! Read-only views of adapter state for recorders.

use std::str::FromStr;

use hc_transport::Transport;

use crate::adapter::ExperimentalControl;

/// Named arrays a recorder can ask an adapter for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderQuery {
    CtrlSignal,
    DaqSignal,
    TrialOffset,
    CtrlOffset,
    DaqOffset,
}

impl FromStr for RecorderQuery {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ctrlSig" | "ctrlSignal" | "ctrlSignals" => Ok(Self::CtrlSignal),
            "daqSig" | "daqSignal" | "daqSignals" => Ok(Self::DaqSignal),
            "trialSigOffset" | "trialOffset" => Ok(Self::TrialOffset),
            "ctrlSigOffset" | "ctrlOffset" => Ok(Self::CtrlOffset),
            "daqSigOffset" | "daqOffset" => Ok(Self::DaqOffset),
            other => Err(format!("unknown response name '{other}'")),
        }
    }
}

impl<T: Transport> ExperimentalControl<T> {
    /// Last ctrl array sent. Empty before setup.
    pub fn ctrl_signal(&self) -> &[f64] {
        self.ctrl_buffer()
    }

    /// Last daq array received, before offsets and filters.
    pub fn daq_signal(&self) -> &[f64] {
        self.daq_buffer()
    }

    pub fn trial_offsets(&self) -> &[f64] {
        self.offsets().trial_offsets()
    }

    pub fn ctrl_offsets(&self) -> &[f64] {
        self.offsets().ctrl_offsets()
    }

    pub fn daq_offsets(&self) -> &[f64] {
        self.offsets().daq_offsets()
    }

    pub fn query(&self, query: RecorderQuery) -> &[f64] {
        match query {
            RecorderQuery::CtrlSignal => self.ctrl_signal(),
            RecorderQuery::DaqSignal => self.daq_signal(),
            RecorderQuery::TrialOffset => self.trial_offsets(),
            RecorderQuery::CtrlOffset => self.ctrl_offsets(),
            RecorderQuery::DaqOffset => self.daq_offsets(),
        }
    }

    /// Look an array up by recorder name.
    pub fn response(&self, name: &str) -> Option<&[f64]> {
        name.parse::<RecorderQuery>().ok().map(|q| self.query(q))
    }
}
