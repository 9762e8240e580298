//! Two-phase control handshake and the acquire wait.
//!
//! Flag mode, control cycle:
//!
//! ```text
//! Idle -> Arming (write ctrl, NewTarget = 1)
//!      -> WaitAck (poll SwitchAck until 1)
//!      -> Disarming (NewTarget = 0)
//!      -> WaitDisack (poll SwitchAck until 0)
//!      -> Idle
//! ```
//!
//! Flag mode, acquire cycle: `WaitTarget` (poll AtTarget until 1), read the
//! daq array, `Ready`.
//!
//! Round-trip mode collapses each cycle to one blocking exchange; the
//! transport's write/read of the vectors is the synchronization point.

use tracing::{debug, trace};

use crate::error::TransportResult;
use crate::poll::{CancelToken, PollOptions, poll_until};
use crate::transport::{Flag, HandshakeMode, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HandshakeState {
    #[default]
    Idle,
    Arming,
    WaitAck,
    Disarming,
    WaitDisack,
    WaitTarget,
    Ready,
}

/// Poll counts of the last completed cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HandshakeStats {
    pub controls: usize,
    pub acquires: usize,
    pub last_ack_polls: usize,
    pub last_disack_polls: usize,
    pub last_target_polls: usize,
}

#[derive(Debug, Clone, Default)]
pub struct HandshakeProtocol {
    options: PollOptions,
    cancel: CancelToken,
    state: HandshakeState,
    stats: HandshakeStats,
}

impl HandshakeProtocol {
    pub fn new(options: PollOptions, cancel: CancelToken) -> Self {
        Self {
            options,
            cancel,
            state: HandshakeState::Idle,
            stats: HandshakeStats::default(),
        }
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    pub fn stats(&self) -> HandshakeStats {
        self.stats
    }

    pub fn options(&self) -> &PollOptions {
        &self.options
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Forget a half-finished cycle after the transport was reset.
    pub fn reset(&mut self) {
        self.state = HandshakeState::Idle;
    }

    /// Push `ctrl` to the controller and wait until it is accepted.
    ///
    /// On error the state is left at the phase that failed.
    pub fn control<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        ctrl: &[f64],
    ) -> TransportResult<()> {
        match transport.mode() {
            HandshakeMode::RoundTrip => {
                self.state = HandshakeState::Arming;
                transport.write_vector(ctrl)?;
            }
            HandshakeMode::Flags => {
                self.state = HandshakeState::Arming;
                transport.write_vector(ctrl)?;
                transport.write_flag(Flag::NewTarget, 1)?;

                self.state = HandshakeState::WaitAck;
                self.stats.last_ack_polls = self.wait_flag(transport, Flag::SwitchAck, 1)?;

                self.state = HandshakeState::Disarming;
                transport.write_flag(Flag::NewTarget, 0)?;

                self.state = HandshakeState::WaitDisack;
                self.stats.last_disack_polls = self.wait_flag(transport, Flag::SwitchAck, 0)?;
            }
        }
        self.state = HandshakeState::Idle;
        self.stats.controls += 1;
        trace!(
            transport = transport.name(),
            ack_polls = self.stats.last_ack_polls,
            disack_polls = self.stats.last_disack_polls,
            "control cycle done"
        );
        Ok(())
    }

    /// Wait until the controller is at target, then read the daq array.
    pub fn acquire<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        daq: &mut [f64],
    ) -> TransportResult<()> {
        self.state = HandshakeState::WaitTarget;
        if transport.mode() == HandshakeMode::Flags {
            self.stats.last_target_polls = self.wait_flag(transport, Flag::AtTarget, 1)?;
        }
        transport.read_vector(daq)?;
        self.state = HandshakeState::Ready;
        self.stats.acquires += 1;
        trace!(
            transport = transport.name(),
            target_polls = self.stats.last_target_polls,
            "acquire cycle done"
        );
        Ok(())
    }

    fn wait_flag<T: Transport + ?Sized>(
        &self,
        transport: &mut T,
        flag: Flag,
        expected: i32,
    ) -> TransportResult<usize> {
        let what = match (flag, expected) {
            (Flag::SwitchAck, 1) => "switch ack",
            (Flag::SwitchAck, _) => "switch ack release",
            (Flag::AtTarget, _) => "at target",
            (Flag::NewTarget, _) => "new target",
        };
        let polls = poll_until(&self.options, &self.cancel, what, || {
            Ok(transport.read_flag(flag)? == expected)
        })?;
        debug!(flag = %flag, expected, polls, "flag reached");
        Ok(polls)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::transport::TransportSizes;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        WriteVector(usize),
        WriteFlag(Flag, i32),
        ReadFlag(Flag, i32),
        ReadVector,
    }

    /// Acknowledges `NewTarget` after `delay` extra polls.
    #[derive(Debug, Default)]
    struct ScriptedFlags {
        delay: usize,
        new_target: i32,
        ack: i32,
        pending: usize,
        at_target_after: usize,
        target_polls: usize,
        fail_read: bool,
        calls: Vec<Call>,
    }

    impl Transport for ScriptedFlags {
        fn name(&self) -> &'static str {
            "scripted"
        }
        fn mode(&self) -> HandshakeMode {
            HandshakeMode::Flags
        }
        fn is_connected(&self) -> bool {
            true
        }
        fn connect(&mut self) -> TransportResult<()> {
            Ok(())
        }
        fn configure(&mut self, _: &TransportSizes) -> TransportResult<()> {
            Ok(())
        }
        fn write_vector(&mut self, values: &[f64]) -> TransportResult<()> {
            self.calls.push(Call::WriteVector(values.len()));
            Ok(())
        }
        fn read_vector(&mut self, out: &mut [f64]) -> TransportResult<()> {
            self.calls.push(Call::ReadVector);
            out.fill(1.0);
            Ok(())
        }
        fn write_flag(&mut self, flag: Flag, value: i32) -> TransportResult<()> {
            self.calls.push(Call::WriteFlag(flag, value));
            if flag == Flag::NewTarget {
                self.new_target = value;
                self.pending = self.delay;
            }
            Ok(())
        }
        fn read_flag(&mut self, flag: Flag) -> TransportResult<i32> {
            if self.fail_read {
                return Err(TransportError::Device {
                    op: "read flag",
                    code: -3,
                });
            }
            let value = match flag {
                Flag::SwitchAck => {
                    if self.pending > 0 {
                        self.pending -= 1;
                    } else {
                        self.ack = self.new_target;
                    }
                    self.ack
                }
                Flag::AtTarget => {
                    self.target_polls += 1;
                    i32::from(self.target_polls > self.at_target_after)
                }
                Flag::NewTarget => self.new_target,
            };
            self.calls.push(Call::ReadFlag(flag, value));
            Ok(value)
        }
        fn disconnect(&mut self) -> TransportResult<()> {
            Ok(())
        }
    }

    #[test]
    fn control_writes_twice_and_polls_twice() {
        let mut t = ScriptedFlags::default();
        let mut hs = HandshakeProtocol::default();
        hs.control(&mut t, &[1.0, 2.0]).unwrap();

        let flag_calls: Vec<&Call> = t
            .calls
            .iter()
            .filter(|c| !matches!(c, Call::WriteVector(_)))
            .collect();
        assert_eq!(
            flag_calls,
            vec![
                &Call::WriteFlag(Flag::NewTarget, 1),
                &Call::ReadFlag(Flag::SwitchAck, 1),
                &Call::WriteFlag(Flag::NewTarget, 0),
                &Call::ReadFlag(Flag::SwitchAck, 0),
            ]
        );
        assert_eq!(t.calls[0], Call::WriteVector(2));
        assert_eq!(hs.state(), HandshakeState::Idle);
        assert_eq!(hs.stats().controls, 1);
    }

    #[test]
    fn slow_ack_is_polled_until_seen() {
        let mut t = ScriptedFlags {
            delay: 3,
            ..Default::default()
        };
        let mut hs = HandshakeProtocol::default();
        hs.control(&mut t, &[0.5]).unwrap();
        assert_eq!(hs.stats().last_ack_polls, 4);
        assert_eq!(hs.stats().last_disack_polls, 4);
    }

    #[test]
    fn acquire_waits_for_target() {
        let mut t = ScriptedFlags {
            at_target_after: 2,
            ..Default::default()
        };
        let mut hs = HandshakeProtocol::default();
        let mut daq = [0.0; 3];
        hs.acquire(&mut t, &mut daq).unwrap();
        assert_eq!(daq, [1.0; 3]);
        assert_eq!(hs.stats().last_target_polls, 3);
        assert_eq!(hs.state(), HandshakeState::Ready);
        assert_eq!(t.calls.last(), Some(&Call::ReadVector));
    }

    #[test]
    fn stalled_ack_times_out_in_wait_ack() {
        let mut t = ScriptedFlags {
            delay: usize::MAX,
            ..Default::default()
        };
        let mut hs =
            HandshakeProtocol::new(PollOptions::unbounded().with_max_polls(5), CancelToken::new());
        let err = hs.control(&mut t, &[0.0]).unwrap_err();
        assert!(matches!(
            err,
            TransportError::Timeout {
                what: "switch ack",
                polls: 5,
                ..
            }
        ));
        assert_eq!(hs.state(), HandshakeState::WaitAck);
    }

    #[test]
    fn device_error_surfaces_from_wait() {
        let mut t = ScriptedFlags {
            fail_read: true,
            ..Default::default()
        };
        let mut hs = HandshakeProtocol::default();
        let err = hs.control(&mut t, &[0.0]).unwrap_err();
        assert_eq!(
            err,
            TransportError::Device {
                op: "read flag",
                code: -3
            }
        );
    }

    #[test]
    fn cancelled_wait() {
        let mut t = ScriptedFlags {
            at_target_after: usize::MAX,
            ..Default::default()
        };
        let token = CancelToken::new();
        let mut hs = HandshakeProtocol::new(PollOptions::unbounded(), token.clone());
        token.cancel();
        let err = hs.acquire(&mut t, &mut [0.0]).unwrap_err();
        assert_eq!(err, TransportError::Cancelled { what: "at target" });
    }
}
