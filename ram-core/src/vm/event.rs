//! Notifications published by the interpreter.

use std::fmt;
use std::sync::mpsc::{self, Receiver, Sender};

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The program counter ran past the last instruction.
    EndOfProgram,
    /// An `END` instruction was executed.
    End,
    /// `DIV` by zero; the accumulator is left untouched.
    DivisionByZero,
    /// The cancellation token fired.
    Cancelled,
    Fault(Fault),
}

/// Runtime conditions the static passes cannot rule out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// A register index (direct or read through a pointer) outside the bank.
    RegisterOutOfRange { register: u32 },
    /// A jump whose label was never resolved.
    UnresolvedLabel { instruction: u32 },
    /// An instruction without the operand its opcode needs.
    MissingArgument { instruction: u32 },
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::EndOfProgram => f.write_str("end of program"),
            StopReason::End => f.write_str("END executed"),
            StopReason::DivisionByZero => f.write_str("division by zero"),
            StopReason::Cancelled => f.write_str("cancelled"),
            StopReason::Fault(Fault::RegisterOutOfRange { register }) => {
                write!(f, "register {register} out of range")
            }
            StopReason::Fault(Fault::UnresolvedLabel { instruction }) => {
                write!(f, "unresolved label at instruction {instruction}")
            }
            StopReason::Fault(Fault::MissingArgument { instruction }) => {
                write!(f, "missing argument at instruction {instruction}")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Started,
    /// Published before the instruction at `program_counter` executes.
    Stepped { program_counter: u32 },
    RegisterChanged { index: usize, value: u32 },
    Stopped { reason: StopReason },
}

/// Fan-out of events to every live subscriber.
#[derive(Debug, Default)]
pub(crate) struct Observers {
    senders: Vec<Sender<Event>>,
}

impl Observers {
    pub fn subscribe(&mut self) -> Receiver<Event> {
        let (sender, receiver) = mpsc::channel();
        self.senders.push(sender);
        receiver
    }

    /// Subscribers whose receiver was dropped are forgotten.
    pub fn publish(&mut self, event: Event) {
        if self.senders.is_empty() {
            return;
        }
        self.senders.retain(|sender| sender.send(event.clone()).is_ok());
    }
}
