//! Built-in demo programs.
//!
//! Each demo assembles a small guest program against a `MethodTable`,
//! spawns its contexts, and drives the VM to completion. Guest output goes
//! through a `demo/Console.log(I)V` native registered by the harness.

use bytecode_system::{CodeChunk, Constant, MethodInfo, MethodSel, MethodTable, Opcode};
use core_types::{GuestError, Kind, Value};
use interpreter::{SharedProfiler, Vm};
use natives::{HostContext, NativeOutcome};
use tracing::info;

use crate::error::{CliError, CliResult};

/// Names of the available demos.
pub fn demo_names() -> &'static [&'static str] {
    &["ping-pong", "counter", "timeout"]
}

/// Run a demo by name.
pub fn run_demo(name: &str, step_budget: usize, profile: bool) -> CliResult<()> {
    match name {
        "ping-pong" => ping_pong(step_budget, profile),
        "counter" => counter(step_budget, profile),
        "timeout" => timeout(step_budget, profile),
        other => Err(CliError::UnknownDemo(other.to_string())),
    }
}

fn console_log(ctx: &mut dyn HostContext) -> Result<NativeOutcome, GuestError> {
    let value = ctx.stack().pop().as_int().expect("log takes an int");
    println!("[guest] {value}");
    Ok(NativeOutcome::Void)
}

fn log_sel() -> MethodSel {
    MethodSel::new("demo/Console", "log", "(I)V")
}

fn new_vm(table: MethodTable, step_budget: usize, profile: bool) -> (Vm, Option<SharedProfiler>) {
    let mut vm = Vm::new(Box::new(table)).with_step_budget(step_budget);
    let mut handle = None;
    if profile {
        let profiler = SharedProfiler::new();
        handle = Some(profiler.clone());
        vm = vm.with_instrument(Box::new(profiler));
    }
    vm.register_native(log_sel(), console_log);
    (vm, handle)
}

fn finish(vm: &Vm, profiler: Option<SharedProfiler>) {
    info!(
        contexts = vm.active_count(),
        virtual_ms = vm.now_ms(),
        "run finished"
    );
    if let Some(profiler) = profiler {
        print!("{}", profiler.report());
    }
}

fn static_method(
    table: &mut MethodTable,
    name: &str,
    consumed: u16,
    locals: u16,
    code: CodeChunk,
) -> MethodSel {
    table.register(
        MethodInfo::new("demo/Main", name, "()")
            .with_static(true)
            .with_consumed_slots(consumed)
            .with_locals_size(locals)
            .with_code(code),
    )
}

/// Two threads rendezvous over one monitor: the waiter logs 1 and waits,
/// the notifier logs 2 and notifies, the waiter wakes and logs 3.
fn ping_pong(step_budget: usize, profile: bool) -> CliResult<()> {
    let mut table = MethodTable::new();

    let mut waiter = CodeChunk::new();
    let c1 = waiter.add_constant(Constant::Int(1));
    let c3 = waiter.add_constant(Constant::Int(3));
    let cl0 = waiter.add_constant(Constant::Long(0));
    let log_ref = waiter.add_method_ref(log_sel());
    let wait_ref = waiter.add_method_ref(MethodSel::new("java/lang/Object", "wait", "(J)V"));
    waiter.emit(Opcode::LoadLocal(0));
    waiter.emit(Opcode::MonitorEnter);
    waiter.emit(Opcode::LoadConstant(c1));
    waiter.emit(Opcode::Invoke(log_ref));
    waiter.emit(Opcode::LoadLocal(0));
    waiter.emit(Opcode::LoadConstant(cl0));
    waiter.emit(Opcode::Invoke(wait_ref));
    waiter.emit(Opcode::LoadConstant(c3));
    waiter.emit(Opcode::Invoke(log_ref));
    waiter.emit(Opcode::LoadLocal(0));
    waiter.emit(Opcode::MonitorExit);
    waiter.emit(Opcode::Return);
    let waiter = static_method(&mut table, "waiter", 1, 1, waiter);

    let mut notifier = CodeChunk::new();
    let c2 = notifier.add_constant(Constant::Int(2));
    let log_ref = notifier.add_method_ref(log_sel());
    let notify_ref = notifier.add_method_ref(MethodSel::new("java/lang/Object", "notify", "()V"));
    notifier.emit(Opcode::LoadLocal(0));
    notifier.emit(Opcode::MonitorEnter);
    notifier.emit(Opcode::LoadConstant(c2));
    notifier.emit(Opcode::Invoke(log_ref));
    notifier.emit(Opcode::LoadLocal(0));
    notifier.emit(Opcode::Invoke(notify_ref));
    notifier.emit(Opcode::LoadLocal(0));
    notifier.emit(Opcode::MonitorExit);
    notifier.emit(Opcode::Return);
    let notifier = static_method(&mut table, "notifier", 1, 1, notifier);

    let (mut vm, profiler) = new_vm(table, step_budget, profile);
    let obj = vm.runtime.heap.alloc_object("demo/Lock");
    vm.spawn(&waiter, &[Value::Reference(obj)])?;
    vm.spawn(&notifier, &[Value::Reference(obj)])?;
    vm.run();

    let monitor = vm.monitor(obj).expect("monitor exists");
    println!(
        "ping-pong done: monitor owner={:?} level={}",
        monitor.owner(),
        monitor.level()
    );
    finish(&vm, profiler);
    Ok(())
}

/// Two threads each add 1000 to a shared counter inside a monitor; the
/// step budget forces interleaving between them.
fn counter(step_budget: usize, profile: bool) -> CliResult<()> {
    let mut table = MethodTable::new();

    let mut worker = CodeChunk::new();
    let c0 = worker.add_constant(Constant::Int(0));
    let c1 = worker.add_constant(Constant::Int(1));
    let cn = worker.add_constant(Constant::Int(1000));
    worker.emit(Opcode::LoadConstant(c0)); // 0
    worker.emit(Opcode::StoreLocal(2)); // 1
    worker.emit(Opcode::LoadLocal(2)); // 2: loop head
    worker.emit(Opcode::LoadConstant(cn)); // 3
    worker.emit(Opcode::IntLt); // 4
    worker.emit(Opcode::JumpIfZero(20)); // 5
    worker.emit(Opcode::LoadLocal(0)); // 6
    worker.emit(Opcode::MonitorEnter); // 7
    worker.emit(Opcode::LoadLocal(1)); // 8
    worker.emit(Opcode::LoadConstant(c0)); // 9
    worker.emit(Opcode::LoadLocal(1)); // 10
    worker.emit(Opcode::LoadConstant(c0)); // 11
    worker.emit(Opcode::ArrayGet); // 12
    worker.emit(Opcode::LoadConstant(c1)); // 13
    worker.emit(Opcode::Add); // 14
    worker.emit(Opcode::ArraySet); // 15
    worker.emit(Opcode::LoadLocal(0)); // 16
    worker.emit(Opcode::MonitorExit); // 17
    worker.emit(Opcode::IncLocal(2, 1)); // 18
    worker.emit(Opcode::Jump(2)); // 19
    worker.emit(Opcode::Return); // 20
    let worker = static_method(&mut table, "worker", 2, 3, worker);

    let (mut vm, profiler) = new_vm(table, step_budget, profile);
    let lock = vm.runtime.heap.alloc_object("demo/Lock");
    let counter = vm.runtime.heap.alloc_primitive_array(Kind::Int, 1);
    let args = [Value::Reference(lock), Value::Reference(counter)];
    vm.spawn(&worker, &args)?;
    vm.spawn(&worker, &args)?;
    vm.run();

    println!(
        "counter done: {:?} (expected Int(2000))",
        vm.runtime.heap.get(counter).array_get(0).unwrap()
    );
    finish(&vm, profiler);
    Ok(())
}

/// A timed wait that nobody notifies: the timer wakes the waiter on the
/// virtual clock.
fn timeout(step_budget: usize, profile: bool) -> CliResult<()> {
    let mut table = MethodTable::new();

    let mut waiter = CodeChunk::new();
    let c1 = waiter.add_constant(Constant::Int(1));
    let c2 = waiter.add_constant(Constant::Int(2));
    let cms = waiter.add_constant(Constant::Long(250));
    let log_ref = waiter.add_method_ref(log_sel());
    let wait_ref = waiter.add_method_ref(MethodSel::new("java/lang/Object", "wait", "(J)V"));
    waiter.emit(Opcode::LoadLocal(0));
    waiter.emit(Opcode::MonitorEnter);
    waiter.emit(Opcode::LoadConstant(c1));
    waiter.emit(Opcode::Invoke(log_ref));
    waiter.emit(Opcode::LoadLocal(0));
    waiter.emit(Opcode::LoadConstant(cms));
    waiter.emit(Opcode::Invoke(wait_ref));
    waiter.emit(Opcode::LoadConstant(c2));
    waiter.emit(Opcode::Invoke(log_ref));
    waiter.emit(Opcode::LoadLocal(0));
    waiter.emit(Opcode::MonitorExit);
    waiter.emit(Opcode::Return);
    let waiter = static_method(&mut table, "waiter", 1, 1, waiter);

    let (mut vm, profiler) = new_vm(table, step_budget, profile);
    let obj = vm.runtime.heap.alloc_object("demo/Lock");
    vm.spawn(&waiter, &[Value::Reference(obj)])?;
    vm.run();

    println!("timeout done: woke at virtual {}ms", vm.now_ms());
    finish(&vm, profiler);
    Ok(())
}
