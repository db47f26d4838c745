//! The register machine interpreter.
//!
//! The interpreter owns a register bank (accumulator plus general
//! registers), a memory of resolved instructions and a program counter.
//! Hosts observe it through an event channel rather than by reading the
//! bank while a run is in flight.

pub mod cancel;
pub mod clock;
pub mod event;
pub mod register;

use std::sync::mpsc::Receiver;
use std::thread::JoinHandle;

use crate::error::CoreError;
use crate::ram::ast::{ArgumentValue, Instruction, Label, OpCode, Scope};

pub use cancel::CancellationToken;
pub use clock::Pacing;
pub use event::{Event, Fault, StopReason};
pub use register::{MAX_REGISTERS, Register};

use clock::Ticker;
use event::Observers;

/// Machine settings a host chooses before loading a program.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MachineConfig {
    /// Number of general registers (the accumulator comes on top).
    pub registers: u32,
    /// Instructions per second in clocked mode.
    pub speed: f64,
    /// Run without any delay between instructions.
    pub real_time: bool,
}

impl Default for MachineConfig {
    fn default() -> Self {
        MachineConfig {
            registers: 5,
            speed: 1.0,
            real_time: false,
        }
    }
}

impl MachineConfig {
    /// Check the settings, returning the pacing they describe.
    pub fn pacing(&self) -> Result<Pacing, CoreError> {
        register::check_count(self.registers)?;
        if self.real_time {
            Ok(Pacing::RealTime)
        } else {
            Pacing::from_speed(self.speed)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    Running,
    Stopped,
}

/// What executing one instruction does to control flow.
enum Flow {
    Next,
    Jump(u32),
    Halt(StopReason),
}

#[derive(Debug)]
pub struct Interpreter {
    registers: Vec<Register>,
    memory: Vec<Instruction>,
    program_counter: u32,
    labels: Vec<Label>,
    state: State,
    pacing: Pacing,
    last_stop: Option<StopReason>,
    observers: Observers,
}

impl Default for Interpreter {
    fn default() -> Self {
        Interpreter::new()
    }
}

impl Interpreter {
    /// An idle interpreter with an empty memory and the default bank.
    pub fn new() -> Self {
        let config = MachineConfig::default();
        Interpreter {
            registers: register::bank(config.registers),
            memory: Vec::new(),
            program_counter: 0,
            labels: Vec::new(),
            state: State::Idle,
            pacing: Pacing::Clocked {
                period: std::time::Duration::from_secs(1),
            },
            last_stop: None,
            observers: Observers::default(),
        }
    }

    pub fn with_config(config: MachineConfig) -> Result<Self, CoreError> {
        let mut interpreter = Interpreter::new();
        interpreter.pacing = config.pacing()?;
        interpreter.registers = register::bank(config.registers);
        Ok(interpreter)
    }

    pub fn set_pacing(&mut self, pacing: Pacing) {
        self.pacing = pacing;
    }

    pub fn pacing(&self) -> Pacing {
        self.pacing
    }

    /// Replace memory with `program` and reset the machine.
    ///
    /// The bank is rebuilt with `register_count` general registers plus
    /// the accumulator, all zero; the program counter returns to 0.
    /// Counts above [`MAX_REGISTERS`] are rejected and leave the machine
    /// untouched.
    pub fn load_program(&mut self, program: Scope, register_count: u32) -> Result<(), CoreError> {
        register::check_count(register_count)?;
        self.memory = program.instructions;
        self.labels = program.labels;
        self.registers = register::bank(register_count);
        self.program_counter = 0;
        self.state = State::Idle;
        self.last_stop = None;
        tracing::debug!(
            instructions = self.memory.len(),
            registers = register_count,
            "loaded program"
        );
        Ok(())
    }

    /// Register a new observer.
    pub fn subscribe(&mut self) -> Receiver<Event> {
        self.observers.subscribe()
    }

    pub fn registers(&self) -> &[Register] {
        &self.registers
    }

    pub fn memory(&self) -> &[Instruction] {
        &self.memory
    }

    pub fn program_counter(&self) -> u32 {
        self.program_counter
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn last_stop(&self) -> Option<StopReason> {
        self.last_stop
    }

    /// Run until the program halts or `token` is cancelled.
    ///
    /// In clocked mode each instruction waits for the next timer tick and
    /// one extra tick is spent before reporting the stop, so the last
    /// state stays visible for a full period.
    pub fn execute(&mut self, token: &CancellationToken) -> StopReason {
        self.state = State::Running;
        self.observers.publish(Event::Started);
        tracing::info!(pacing = ?self.pacing, "execution started");

        let mut ticker = Ticker::new(self.pacing);
        let reason = loop {
            if self.program_counter as usize >= self.memory.len() {
                break StopReason::EndOfProgram;
            }
            if !ticker.tick(token) {
                break StopReason::Cancelled;
            }
            if let Some(reason) = self.step_once() {
                break reason;
            }
        };

        if reason != StopReason::Cancelled && !matches!(self.pacing, Pacing::RealTime) {
            ticker.tick(token);
        }
        self.finish(reason);
        reason
    }

    /// Run [`Interpreter::execute`] on a worker thread.
    ///
    /// The interpreter is moved into the thread and handed back when the
    /// run ends, so only one run can be in flight at a time.
    pub fn spawn(mut self, token: CancellationToken) -> JoinHandle<Interpreter> {
        std::thread::spawn(move || {
            self.execute(&token);
            self
        })
    }

    /// Execute exactly one instruction, for hosts that single-step.
    ///
    /// Returns the stop reason when this step ended the program.
    pub fn step(&mut self) -> Option<StopReason> {
        if self.state == State::Stopped {
            return self.last_stop;
        }
        if self.program_counter as usize >= self.memory.len() {
            self.finish(StopReason::EndOfProgram);
            return Some(StopReason::EndOfProgram);
        }
        self.state = State::Running;
        let reason = self.step_once();
        match reason {
            Some(reason) => self.finish(reason),
            None => self.state = State::Idle,
        }
        reason
    }

    fn finish(&mut self, reason: StopReason) {
        self.state = State::Stopped;
        self.last_stop = Some(reason);
        self.observers.publish(Event::Stopped { reason });
        tracing::info!(%reason, program_counter = self.program_counter, "execution stopped");
    }

    fn step_once(&mut self) -> Option<StopReason> {
        let program_counter = self.program_counter;
        self.observers.publish(Event::Stepped { program_counter });

        let flow = match self.memory.get(program_counter as usize) {
            Some(instruction) => {
                tracing::trace!(program_counter, %instruction, "step");
                let instruction = instruction.clone();
                self.execute_instruction(program_counter, &instruction)
            }
            None => Flow::Halt(StopReason::EndOfProgram),
        };

        match flow {
            Flow::Next => {
                self.program_counter += 1;
                None
            }
            Flow::Jump(address) => {
                self.program_counter = address;
                None
            }
            Flow::Halt(reason) => {
                self.program_counter += 1;
                Some(reason)
            }
        }
    }

    fn execute_instruction(&mut self, address: u32, instruction: &Instruction) -> Flow {
        let missing = Flow::Halt(StopReason::Fault(Fault::MissingArgument {
            instruction: address,
        }));

        match instruction.opcode {
            OpCode::End => Flow::Halt(StopReason::End),
            OpCode::Load | OpCode::Add | OpCode::Sub | OpCode::Mul | OpCode::Div => {
                let Some(argument) = &instruction.argument else {
                    return missing;
                };
                let value = match self.operand(&argument.value) {
                    Ok(value) => value,
                    Err(fault) => return Flow::Halt(StopReason::Fault(fault)),
                };
                let accumulator = self.registers[0].value;
                let result = match instruction.opcode {
                    OpCode::Load => value,
                    OpCode::Add => accumulator.wrapping_add(value),
                    OpCode::Sub => accumulator.saturating_sub(value),
                    OpCode::Mul => accumulator.wrapping_mul(value),
                    _ => {
                        if value == 0 {
                            return Flow::Halt(StopReason::DivisionByZero);
                        }
                        accumulator / value
                    }
                };
                self.write(0, result);
                Flow::Next
            }
            OpCode::Store => {
                let Some(argument) = &instruction.argument else {
                    return missing;
                };
                let target = match &argument.value {
                    ArgumentValue::Address(index) => Ok(*index),
                    ArgumentValue::AddressPointer(index) => self.read(*index),
                    _ => return missing,
                };
                let target = match target {
                    Ok(target) if (target as usize) < self.registers.len() => target,
                    Ok(register) | Err(Fault::RegisterOutOfRange { register }) => {
                        return Flow::Halt(StopReason::Fault(Fault::RegisterOutOfRange {
                            register,
                        }));
                    }
                    Err(fault) => return Flow::Halt(StopReason::Fault(fault)),
                };
                let accumulator = self.registers[0].value;
                self.write(target as usize, accumulator);
                Flow::Next
            }
            OpCode::Goto | OpCode::JZero | OpCode::JNotZero => {
                let accumulator = self.registers[0].value;
                let taken = match instruction.opcode {
                    OpCode::JZero => accumulator == 0,
                    OpCode::JNotZero => accumulator != 0,
                    _ => true,
                };
                if !taken {
                    return Flow::Next;
                }
                match instruction.argument.as_ref().map(|argument| &argument.value) {
                    Some(ArgumentValue::LabelReference {
                        label: Some(label), ..
                    }) => Flow::Jump(label.instruction_address),
                    Some(ArgumentValue::LabelReference { label: None, .. }) => {
                        Flow::Halt(StopReason::Fault(Fault::UnresolvedLabel {
                            instruction: address,
                        }))
                    }
                    _ => missing,
                }
            }
        }
    }

    /// Value an operand stands for.
    fn operand(&self, value: &ArgumentValue) -> Result<u32, Fault> {
        match value {
            ArgumentValue::Immediate(value) => Ok(*value),
            ArgumentValue::Address(index) => self.read(*index),
            ArgumentValue::AddressPointer(index) => self.read(self.read(*index)?),
            ArgumentValue::LabelReference { .. } => Err(Fault::MissingArgument {
                instruction: self.program_counter,
            }),
        }
    }

    fn read(&self, index: u32) -> Result<u32, Fault> {
        self.registers
            .get(index as usize)
            .map(|register| register.value)
            .ok_or(Fault::RegisterOutOfRange { register: index })
    }

    fn write(&mut self, index: usize, value: u32) {
        let register = &mut self.registers[index];
        if register.value != value {
            register.value = value;
            self.observers
                .publish(Event::RegisterChanged { index, value });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ram::{parse, resolve_labels, tokenize};
    use std::time::Duration;

    fn program(source: &str) -> Scope {
        resolve_labels(parse(&tokenize(source).expect("tokenize")).expect("parse"))
            .expect("resolve")
    }

    fn loaded(source: &str, registers: u32) -> Interpreter {
        let mut interpreter = Interpreter::new();
        interpreter.set_pacing(Pacing::RealTime);
        interpreter
            .load_program(program(source), registers)
            .expect("load");
        interpreter
    }

    fn values(interpreter: &Interpreter) -> Vec<u32> {
        interpreter.registers().iter().map(|r| r.value).collect()
    }

    #[test]
    fn load_program_resets_the_machine() {
        let mut interpreter = loaded("LOAD #7\nSTORE 1\nEND", 2);
        interpreter.execute(&CancellationToken::new());
        assert_eq!(values(&interpreter), vec![7, 7, 0]);

        interpreter.load_program(program("END"), 4).expect("load");
        assert_eq!(values(&interpreter), vec![0; 5]);
        assert_eq!(interpreter.program_counter(), 0);
        assert_eq!(interpreter.state(), State::Idle);
    }

    #[test]
    fn stepping_a_counting_loop_is_deterministic() {
        let source = "LOAD #1\nSTORE 1\nLOAD #2\nSTORE 2\nstart: LOAD 1\nADD 2\nSTORE 2\nGOTO start\nEND";
        let mut interpreter = loaded(source, 2);

        for _ in 0..7 {
            assert_eq!(interpreter.step(), None);
        }
        assert_eq!(values(&interpreter), vec![3, 1, 3]);

        // GOTO lands exactly on the label.
        assert_eq!(interpreter.step(), None);
        assert_eq!(interpreter.program_counter(), 4);

        for _ in 0..3 {
            interpreter.step();
        }
        assert_eq!(values(&interpreter)[1..], [1, 4]);
        for _ in 0..4 {
            interpreter.step();
        }
        assert_eq!(values(&interpreter)[1..], [1, 5]);
    }

    #[test]
    fn arithmetic_follows_unsigned_semantics() {
        let mut interpreter = loaded(
            "LOAD #5\nSUB #9\nSTORE 1\nLOAD #4294967295\nADD #2\nSTORE 2\nLOAD #17\nDIV #5\nMUL #3\nSTORE 3\nEND",
            3,
        );
        assert_eq!(interpreter.execute(&CancellationToken::new()), StopReason::End);
        assert_eq!(values(&interpreter)[1..], [0, 1, 9]);
    }

    #[test]
    fn pointers_add_one_level_of_indirection() {
        let mut interpreter = loaded(
            "LOAD #3\nSTORE 1\nLOAD #42\nSTORE *1\nLOAD #0\nLOAD *1\nSTORE 2\nEND",
            3,
        );
        interpreter.execute(&CancellationToken::new());
        assert_eq!(values(&interpreter), vec![42, 3, 42, 42]);
    }

    #[test]
    fn division_by_zero_halts_without_touching_the_accumulator() {
        let mut interpreter = loaded("LOAD #8\nDIV 1\nLOAD #1\nEND", 1);
        assert_eq!(
            interpreter.execute(&CancellationToken::new()),
            StopReason::DivisionByZero
        );
        assert_eq!(values(&interpreter)[0], 8);
        assert_eq!(interpreter.program_counter(), 2);
    }

    #[test]
    fn end_stops_before_later_instructions() {
        let mut interpreter = loaded("LOAD #1\nEND\nLOAD #2", 0);
        assert_eq!(interpreter.execute(&CancellationToken::new()), StopReason::End);
        assert_eq!(values(&interpreter), vec![1]);
        assert_eq!(interpreter.state(), State::Stopped);
    }

    #[test]
    fn conditional_jumps_test_the_accumulator() {
        let source = "LOAD #0\nJZERO zero\nLOAD #99\nzero: STORE 1\nLOAD #3\nJNZERO nonzero\nLOAD #0\nnonzero: STORE 2\nJZERO never\nEND\nnever: STORE 3";
        let mut interpreter = loaded(source, 3);
        assert_eq!(interpreter.execute(&CancellationToken::new()), StopReason::End);
        assert_eq!(values(&interpreter)[1..], [0, 3, 0]);
    }

    #[test]
    fn running_off_the_end_stops_the_program() {
        let mut interpreter = loaded("LOAD #1", 0);
        assert_eq!(
            interpreter.execute(&CancellationToken::new()),
            StopReason::EndOfProgram
        );
    }

    #[test]
    fn pointer_outside_the_bank_faults() {
        let mut interpreter = loaded("LOAD #50\nSTORE 1\nLOAD *1\nEND", 1);
        assert_eq!(
            interpreter.execute(&CancellationToken::new()),
            StopReason::Fault(Fault::RegisterOutOfRange { register: 50 })
        );
    }

    #[test]
    fn unresolved_jump_faults() {
        let mut interpreter = Interpreter::new();
        interpreter.set_pacing(Pacing::RealTime);
        interpreter
            .load_program(parse(&tokenize("GOTO nowhere").expect("tokenize")).expect("parse"), 0)
            .expect("load");
        assert_eq!(
            interpreter.execute(&CancellationToken::new()),
            StopReason::Fault(Fault::UnresolvedLabel { instruction: 0 })
        );
    }

    #[test]
    fn publishes_events_in_order() {
        let mut interpreter = loaded("LOAD #2\nSTORE 1\nEND", 1);
        let events = interpreter.subscribe();
        interpreter.execute(&CancellationToken::new());
        let received: Vec<Event> = events.try_iter().collect();
        assert_eq!(
            received,
            vec![
                Event::Started,
                Event::Stepped { program_counter: 0 },
                Event::RegisterChanged { index: 0, value: 2 },
                Event::Stepped { program_counter: 1 },
                Event::RegisterChanged { index: 1, value: 2 },
                Event::Stepped { program_counter: 2 },
                Event::Stopped {
                    reason: StopReason::End
                },
            ]
        );
    }

    #[test]
    fn cancellation_stops_a_clocked_infinite_loop() {
        let mut interpreter = loaded("loop: ADD #1\nGOTO loop", 0);
        interpreter.set_pacing(Pacing::Clocked {
            period: Duration::from_millis(1),
        });
        let events = interpreter.subscribe();
        let token = CancellationToken::new();
        let handle = interpreter.spawn(token.clone());

        // Wait until the loop is demonstrably running, then cancel.
        let mut steps = 0;
        while steps < 5 {
            match events.recv_timeout(Duration::from_secs(5)) {
                Ok(Event::Stepped { .. }) => steps += 1,
                Ok(_) => {}
                Err(_) => break,
            }
        }
        assert_eq!(steps, 5);
        token.cancel();
        let interpreter = handle.join().expect("join");
        assert_eq!(interpreter.last_stop(), Some(StopReason::Cancelled));
        assert_eq!(interpreter.state(), State::Stopped);
    }

    #[test]
    fn clocked_execution_runs_to_completion() {
        let mut interpreter = loaded("LOAD #4\nMUL #4\nSTORE 1\nEND", 1);
        interpreter.set_pacing(Pacing::from_speed(1000.0).expect("pacing"));
        assert_eq!(interpreter.execute(&CancellationToken::new()), StopReason::End);
        assert_eq!(values(&interpreter), vec![16, 16]);
    }

    #[test]
    fn with_config_validates_speed() {
        let config = MachineConfig {
            speed: 0.0,
            ..MachineConfig::default()
        };
        assert!(matches!(
            Interpreter::with_config(config),
            Err(CoreError::InvalidSpeed(_))
        ));
        let interpreter = Interpreter::with_config(MachineConfig {
            registers: 2,
            real_time: true,
            ..MachineConfig::default()
        })
        .expect("config");
        assert_eq!(interpreter.registers().len(), 3);
        assert_eq!(interpreter.pacing(), Pacing::RealTime);
    }

    #[test]
    fn oversized_banks_are_rejected() {
        let config = MachineConfig {
            registers: u32::MAX,
            ..MachineConfig::default()
        };
        assert!(matches!(
            Interpreter::with_config(config),
            Err(CoreError::InvalidRegisterCount(u32::MAX))
        ));

        let mut interpreter = loaded("LOAD #1\nEND", 2);
        let err = interpreter
            .load_program(program("END"), MAX_REGISTERS + 1)
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidRegisterCount(_)));
        assert_eq!(interpreter.memory().len(), 2);
        assert_eq!(interpreter.registers().len(), 3);
    }
}
