use std::cell::RefCell;
use std::rc::Rc;

use machineforth_vm::{ERR_ERASE_VIOLATION, NoUserFunction, Tracer, Vm};

const ROM: usize = 16;
const RAM: usize = 64;
const AXI: usize = 2048;

/// Packs a single opcode into the top (slot-26) position, remaining bits
/// zero. Opcodes that don't hard-return keep dispatching through the
/// lower slots as all-zero NOPs.
fn op(opcode: u32) -> u32 {
    opcode << 26
}

/// `LIT` consumes the rest of the word as its immediate.
fn lit(value: u32) -> u32 {
    (0o70 << 26) | (value & 0x03FF_FFFF)
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct TraceRecord {
    kind: u8,
    id: i32,
    old: u32,
    new: u32,
}

#[derive(Clone, Default)]
struct RecordingTracer(Rc<RefCell<Vec<TraceRecord>>>);

impl Tracer for RecordingTracer {
    fn trace(&mut self, kind: u8, id: i32, old: u32, new: u32) {
        self.0.borrow_mut().push(TraceRecord { kind, id, old, new });
    }
}

#[test]
fn power_on_reset_gives_documented_initial_state() {
    let vm = Vm::<ROM, RAM, AXI>::new();
    assert_eq!(vm.pc(), 0);
    assert_eq!(vm.data_stack_top(), (0, 0));
    assert_eq!(vm.stack_depth(), 0);
}

#[test]
fn literal_dup_drop_round_trip_through_the_data_stack() {
    let mut vm = Vm::<ROM, RAM, AXI>::new();

    vm.step(lit(7), false);
    assert_eq!(vm.data_stack_top(), (7, 0));
    assert_eq!(vm.stack_depth(), 1);

    vm.step(op(0o01), false); // DUP
    assert_eq!(vm.data_stack_top(), (7, 7));
    assert_eq!(vm.stack_depth(), 2);

    vm.step(op(0o72), false); // DROP
    assert_eq!(vm.data_stack_top(), (7, 7));
    assert_eq!(vm.stack_depth(), 1);
}

#[test]
fn untracing_every_record_in_reverse_restores_exact_prior_state() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut vm = Vm::<ROM, RAM, AXI, NoUserFunction, RecordingTracer>::with_hooks(
        NoUserFunction,
        RecordingTracer(log.clone()),
    );

    vm.step(lit(7), false);
    vm.step(op(0o01), false); // DUP

    let records: Vec<TraceRecord> = log.borrow().clone();
    assert!(!records.is_empty());
    for rec in records.iter().rev() {
        vm.untrace(rec.id, rec.old);
    }

    assert_eq!(vm.data_stack_top(), (0, 0));
    assert_eq!(vm.stack_depth(), 0);
}

#[test]
fn call_then_semicolon_returns_to_the_instruction_after_the_call() {
    let mut vm = Vm::<ROM, RAM, AXI>::new();
    assert_eq!(vm.pc(), 0);

    vm.step(op(0o74) | 5, false); // CALL 5
    assert_eq!(vm.pc(), 5);

    vm.step(op(0o02), false); // `;`
    assert_eq!(vm.pc(), 1);
}

#[test]
fn at_a_fetches_a_rom_cell_addressed_through_a() {
    let mut vm = Vm::<ROM, RAM, AXI>::new();
    assert_eq!(vm.write_rom(0xDEAD_BEEF, 12), 0);

    vm.step(lit(12), false); // T = 12
    vm.step(op(0o33), false); // A! : A = 12, T = N

    vm.step(op(0o22), false); // @A
    assert_eq!(vm.data_stack_top().0, 0xDEAD_BEEF);
}

#[test]
fn axi_burst_write_without_erase_is_rejected_and_leaves_axi_untouched() {
    // `!A`'s StoreX wraps its address by RAMsize alone (no ROM offset),
    // while SendAXI subtracts ROMsize from A before indexing RAM — so A
    // must be re-pointed between the store and the burst.
    let mut vm = Vm::<ROM, RAM, AXI>::new();

    vm.step(lit(0), false);
    vm.step(op(0o33), false); // A! : A = 0

    vm.step(lit(42), false);
    vm.step(op(0o42), false); // !A : RAM[0] = 42

    vm.step(lit((ROM as u32) * 4), false);
    vm.step(op(0o33), false); // A! : A = byte address SendAXI resolves to RAM[0]

    vm.step(lit(0), false);
    vm.step(lit(400), false); // T = dest byte address (AXI cell 100), N = length 0

    vm.step(op(0o21), false); // !AS, no prior erase
    assert_eq!(vm.ior(), ERR_ERASE_VIOLATION);
    assert_eq!(vm.peek_cell(400), 0);
}

#[test]
fn erasing_a_sector_then_bursting_ands_into_the_erased_content() {
    let _ = env_logger::try_init();
    let mut vm = Vm::<ROM, RAM, AXI>::new();

    vm.step(lit(0), false);
    vm.step(op(0o33), false); // A! : A = 0

    vm.step(lit(42), false);
    vm.step(op(0o42), false); // !A : RAM[0] = 42

    assert_eq!(vm.erase_axi_4k(0), 0);
    assert_eq!(vm.peek_cell(400), 0xFFFF_FFFF);

    vm.step(lit((ROM as u32) * 4), false);
    vm.step(op(0o33), false); // A! : A = byte address SendAXI resolves to RAM[0]

    vm.step(lit(0), false);
    vm.step(lit(400), false); // T = dest byte address, N = length 0

    vm.step(op(0o21), false); // !AS
    assert_eq!(vm.ior(), 0);
    assert_eq!(vm.peek_cell(400), 42);
}

#[test]
fn axi_stream_fetch_pulls_axi_content_into_ram() {
    // Pins the AXI->RAM direction for `@AS`/`ReceiveAXI` (§9 Open Question:
    // the source's `memmove` reads backwards against its own variable names).
    let mut vm = Vm::<ROM, RAM, AXI>::new();

    // Prime AXI[100] = 42 via the already-pinned SendAXI direction.
    vm.step(lit(0), false);
    vm.step(op(0o33), false); // A! : A = 0

    vm.step(lit(42), false);
    vm.step(op(0o42), false); // !A : RAM[0] = 42

    assert_eq!(vm.erase_axi_4k(0), 0);

    vm.step(lit((ROM as u32) * 4), false);
    vm.step(op(0o33), false); // A! : A = byte address SendAXI resolves to RAM[0]

    vm.step(lit(0), false);
    vm.step(lit(400), false); // T = dest byte address (AXI cell 100), N = length 0
    vm.step(op(0o21), false); // !AS
    assert_eq!(vm.ior(), 0);

    // Now pull AXI[100] back into a RAM cell other than RAM[0], via `@AS`.
    vm.step(lit(((ROM as u32) + 5) * 4), false);
    vm.step(op(0o33), false); // A! : A = byte address ReceiveAXI resolves to RAM[5]

    vm.step(lit(0), false);
    vm.step(lit(400), false); // T = src byte address (AXI cell 100), N = length 0
    vm.step(op(0o66), false); // @AS

    assert_eq!(vm.peek_cell(((ROM as u32) + 5) * 4), 42);
}

#[test]
fn stack_pointers_stay_within_the_ram_window_across_many_cycles() {
    let mut vm = Vm::<ROM, RAM, AXI>::new();
    for i in 0..200u32 {
        vm.step(lit(i), false);
        assert!(vm.stack_depth() < RAM as u32);
        if i % 2 == 0 {
            vm.step(op(0o72), false); // DROP
            assert!(vm.stack_depth() < RAM as u32);
        }
    }
}

#[test]
fn only_pc_mutating_opcodes_pay_the_three_cycle_pipeline_flush() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut call_vm = Vm::<ROM, RAM, AXI, NoUserFunction, RecordingTracer>::with_hooks(
        NoUserFunction,
        RecordingTracer(log.clone()),
    );
    let before = call_vm.cycle_count();
    call_vm.step(op(0o74) | 3, false); // CALL, single slot, hard return
    assert_eq!(call_vm.cycle_count() - before, 4); // 1 slot + 3 for the PC write

    let mut nop_vm = Vm::<ROM, RAM, AXI, NoUserFunction, RecordingTracer>::with_hooks(
        NoUserFunction,
        RecordingTracer::default(),
    );
    let before = nop_vm.cycle_count();
    nop_vm.step(0, false); // all five slots plus the tail decode as NOP
    assert_eq!(nop_vm.cycle_count() - before, 6);
}
