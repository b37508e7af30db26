//! Integration tests for the execution core
//!
//! Multi-context scenarios exercising thread natives, the virtual clock,
//! class initialization, exception isolation, instrumentation, and
//! termination.

use bytecode_system::{CodeChunk, Constant, MethodInfo, MethodSel, MethodTable, Opcode};
use core_types::{Kind, Value};
use interpreter::{RunState, SharedProfiler, Vm};

fn static_method(
    table: &mut MethodTable,
    name: &str,
    consumed: u16,
    locals: u16,
    code: CodeChunk,
) -> MethodSel {
    table.register(
        MethodInfo::new("T", name, "()")
            .with_static(true)
            .with_consumed_slots(consumed)
            .with_locals_size(locals)
            .with_code(code),
    )
}

// ============================================================================
// Thread natives
// ============================================================================

#[test]
fn test_thread_start_runs_entry_frame() {
    let mut table = MethodTable::new();

    // Worker.run stores its receiver into itself (a reference array), then
    // stores Thread.currentThread() next to it - both must be the thread
    // object.
    let mut run = CodeChunk::new();
    let c0 = run.add_constant(Constant::Int(0));
    let c1 = run.add_constant(Constant::Int(1));
    let current_ref = run.add_method_ref(MethodSel::new(
        "java/lang/Thread",
        "currentThread",
        "()Ljava/lang/Thread;",
    ));
    run.emit(Opcode::LoadLocal(0));
    run.emit(Opcode::LoadConstant(c0));
    run.emit(Opcode::LoadLocal(0));
    run.emit(Opcode::ArraySet);
    run.emit(Opcode::LoadLocal(0));
    run.emit(Opcode::LoadConstant(c1));
    run.emit(Opcode::Invoke(current_ref));
    run.emit(Opcode::ArraySet);
    run.emit(Opcode::Return);
    table.register(
        MethodInfo::new("demo/Worker", "run", "()V")
            .with_consumed_slots(1)
            .with_code(run),
    );

    let mut main = CodeChunk::new();
    let start_ref = main.add_method_ref(MethodSel::new("java/lang/Thread", "start", "()V"));
    main.emit(Opcode::LoadLocal(0));
    main.emit(Opcode::Invoke(start_ref));
    main.emit(Opcode::Return);
    let main = static_method(&mut table, "main", 1, 1, main);

    let mut vm = Vm::new(Box::new(table));
    let worker = vm.runtime.heap.alloc_ref_array("demo/Worker", 2);
    vm.spawn(&main, &[Value::Reference(worker)]).unwrap();
    vm.run();

    assert_eq!(vm.active_count(), 0);
    assert_eq!(
        vm.runtime.heap.get(worker).array_get(0),
        Some(Value::Reference(worker))
    );
    assert_eq!(
        vm.runtime.heap.get(worker).array_get(1),
        Some(Value::Reference(worker))
    );
}

// ============================================================================
// Sleep and the virtual clock
// ============================================================================

/// sleeper(arr, slot, ms): sleep(ms); arr[0] += 1; arr[slot] = arr[0]
fn sleeper_program(table: &mut MethodTable) -> MethodSel {
    let mut code = CodeChunk::new();
    let c0 = code.add_constant(Constant::Int(0));
    let c1 = code.add_constant(Constant::Int(1));
    let sleep_ref = code.add_method_ref(MethodSel::new("java/lang/Thread", "sleep", "(J)V"));
    code.emit(Opcode::LoadLocalWide(2));
    code.emit(Opcode::Invoke(sleep_ref));
    code.emit(Opcode::LoadLocal(0));
    code.emit(Opcode::LoadConstant(c0));
    code.emit(Opcode::LoadLocal(0));
    code.emit(Opcode::LoadConstant(c0));
    code.emit(Opcode::ArrayGet);
    code.emit(Opcode::LoadConstant(c1));
    code.emit(Opcode::Add);
    code.emit(Opcode::ArraySet);
    code.emit(Opcode::LoadLocal(0));
    code.emit(Opcode::LoadLocal(1));
    code.emit(Opcode::LoadLocal(0));
    code.emit(Opcode::LoadConstant(c0));
    code.emit(Opcode::ArrayGet);
    code.emit(Opcode::ArraySet);
    code.emit(Opcode::Return);
    static_method(table, "sleeper", 4, 4, code)
}

#[test]
fn test_sleepers_wake_in_deadline_order() {
    let mut table = MethodTable::new();
    let sleeper = sleeper_program(&mut table);

    let mut vm = Vm::new(Box::new(table));
    let arr = vm.runtime.heap.alloc_primitive_array(Kind::Int, 3);
    // slot 1 sleeps 100ms, slot 2 sleeps 50ms
    vm.spawn(
        &sleeper,
        &[Value::Reference(arr), Value::Int(1), Value::Long(100)],
    )
    .unwrap();
    vm.spawn(
        &sleeper,
        &[Value::Reference(arr), Value::Int(2), Value::Long(50)],
    )
    .unwrap();
    vm.run();

    // the 50ms sleeper woke first (saw counter 1), the 100ms one second
    assert_eq!(vm.runtime.heap.get(arr).array_get(0), Some(Value::Int(2)));
    assert_eq!(vm.runtime.heap.get(arr).array_get(1), Some(Value::Int(2)));
    assert_eq!(vm.runtime.heap.get(arr).array_get(2), Some(Value::Int(1)));
    assert_eq!(vm.now_ms(), 100);
    assert_eq!(vm.active_count(), 0);
}

// ============================================================================
// Class initialization
// ============================================================================

#[test]
fn test_class_init_runs_exactly_once() {
    let mut table = MethodTable::new();

    let mut clinit = CodeChunk::new();
    let marker = clinit.add_class_ref("demo/Marker");
    clinit.emit(Opcode::New(marker));
    clinit.emit(Opcode::Pop);
    clinit.emit(Opcode::Return);
    table.register(
        MethodInfo::new("demo/Init", "<clinit>", "()V")
            .with_static(true)
            .with_code(clinit),
    );
    let mut f = CodeChunk::new();
    f.emit(Opcode::Return);
    table.register(
        MethodInfo::new("demo/Init", "f", "()V")
            .with_static(true)
            .with_code(f),
    );

    let mut main = CodeChunk::new();
    let f_ref = main.add_method_ref(MethodSel::new("demo/Init", "f", "()V"));
    main.emit(Opcode::Invoke(f_ref));
    main.emit(Opcode::Invoke(f_ref));
    main.emit(Opcode::Return);
    let main = static_method(&mut table, "main", 0, 0, main);

    let mut vm = Vm::new(Box::new(table));
    vm.spawn(&main, &[]).unwrap();
    vm.run();

    assert_eq!(vm.active_count(), 0);
    assert!(vm.runtime.is_initialized("demo/Init"));
    // exactly one class object and one marker, despite two static calls
    assert_eq!(vm.runtime.heap.stats().objects_allocated, 2);
}

#[test]
fn test_reentrant_class_init_does_not_recurse() {
    let mut table = MethodTable::new();

    // <clinit> calls a static method of its own class
    let mut clinit = CodeChunk::new();
    let g_ref = clinit.add_method_ref(MethodSel::new("demo/Rec", "g", "()V"));
    clinit.emit(Opcode::Invoke(g_ref));
    clinit.emit(Opcode::Return);
    table.register(
        MethodInfo::new("demo/Rec", "<clinit>", "()V")
            .with_static(true)
            .with_code(clinit),
    );
    let mut g = CodeChunk::new();
    g.emit(Opcode::Return);
    table.register(
        MethodInfo::new("demo/Rec", "g", "()V")
            .with_static(true)
            .with_code(g),
    );

    let mut main = CodeChunk::new();
    let g_ref = main.add_method_ref(MethodSel::new("demo/Rec", "g", "()V"));
    main.emit(Opcode::Invoke(g_ref));
    main.emit(Opcode::Return);
    let main = static_method(&mut table, "main", 0, 0, main);

    let mut vm = Vm::new(Box::new(table));
    vm.spawn(&main, &[]).unwrap();
    vm.run();

    assert_eq!(vm.active_count(), 0);
    assert!(vm.runtime.is_initialized("demo/Rec"));
}

// ============================================================================
// Exception isolation
// ============================================================================

#[test]
fn test_uncaught_exception_kills_only_its_context() {
    let mut table = MethodTable::new();

    let mut thrower = CodeChunk::new();
    let err_class = thrower.add_class_ref("demo/Boom");
    thrower.emit(Opcode::New(err_class));
    thrower.emit(Opcode::Throw);
    let thrower = static_method(&mut table, "thrower", 0, 0, thrower);

    // worker(arr): arr[0] = 100 after a loop
    let mut worker = CodeChunk::new();
    let c0 = worker.add_constant(Constant::Int(0));
    let cn = worker.add_constant(Constant::Int(100));
    worker.emit(Opcode::LoadConstant(c0)); // 0
    worker.emit(Opcode::StoreLocal(1)); // 1
    worker.emit(Opcode::LoadLocal(1)); // 2
    worker.emit(Opcode::LoadConstant(cn)); // 3
    worker.emit(Opcode::IntLt); // 4
    worker.emit(Opcode::JumpIfZero(8)); // 5
    worker.emit(Opcode::IncLocal(1, 1)); // 6
    worker.emit(Opcode::Jump(2)); // 7
    worker.emit(Opcode::LoadLocal(0)); // 8
    worker.emit(Opcode::LoadConstant(c0)); // 9
    worker.emit(Opcode::LoadLocal(1)); // 10
    worker.emit(Opcode::ArraySet); // 11
    worker.emit(Opcode::Return); // 12
    let worker = static_method(&mut table, "worker", 1, 2, worker);

    let mut vm = Vm::new(Box::new(table));
    let arr = vm.runtime.heap.alloc_primitive_array(Kind::Int, 1);
    vm.spawn(&thrower, &[]).unwrap();
    vm.spawn(&worker, &[Value::Reference(arr)]).unwrap();
    vm.run();

    // the thrower died alone; the worker finished untouched
    assert_eq!(vm.active_count(), 0);
    assert_eq!(vm.runtime.heap.get(arr).array_get(0), Some(Value::Int(100)));
}

// ============================================================================
// Instrumentation
// ============================================================================

#[test]
fn test_method_profiler_counts_activations() {
    let mut table = MethodTable::new();

    let mut leaf = CodeChunk::new();
    leaf.emit(Opcode::Return);
    let leaf = static_method(&mut table, "leaf", 0, 0, leaf);

    let mut main = CodeChunk::new();
    let leaf_ref = main.add_method_ref(leaf);
    main.emit(Opcode::Invoke(leaf_ref));
    main.emit(Opcode::Invoke(leaf_ref));
    main.emit(Opcode::Invoke(leaf_ref));
    main.emit(Opcode::Return);
    let main = static_method(&mut table, "main", 0, 0, main);

    let profiler = SharedProfiler::new();
    let handle = profiler.clone();
    let mut vm = Vm::new(Box::new(table)).with_instrument(Box::new(profiler));
    vm.spawn(&main, &[]).unwrap();
    vm.run();

    let entries = handle.0.borrow().entries();
    let leaf_cost = entries
        .iter()
        .find(|(key, _)| key == "T.leaf.()")
        .map(|(_, cost)| *cost)
        .expect("leaf profiled");
    assert_eq!(leaf_cost.count, 3);
    assert!(entries.iter().any(|(key, _)| key == "T.main.()"));
}

// ============================================================================
// Termination
// ============================================================================

#[test]
fn test_force_stop_terminates_at_suspension_boundary() {
    let mut table = MethodTable::new();
    let mut spin = CodeChunk::new();
    spin.emit(Opcode::Jump(0));
    let spin = static_method(&mut table, "spin", 0, 0, spin);

    let mut vm = Vm::new(Box::new(table)).with_step_budget(50);
    let ctx = vm.spawn(&spin, &[]).unwrap();

    // one slice: the spin loop exhausts its budget and yields
    vm.execute(ctx);
    assert_eq!(vm.context(ctx).unwrap().state, RunState::Running);

    vm.stop_context(ctx);
    vm.run();
    assert_eq!(vm.active_count(), 0);
}

#[test]
fn test_deadlocked_contexts_are_reported_not_killed() {
    let mut table = MethodTable::new();

    // lock first, yield, then lock second
    fn cross_lock(table: &mut MethodTable, name: &str) -> MethodSel {
        let mut code = CodeChunk::new();
        let yield_ref = code.add_method_ref(MethodSel::new("java/lang/Thread", "yield", "()V"));
        code.emit(Opcode::LoadLocal(0));
        code.emit(Opcode::MonitorEnter);
        code.emit(Opcode::Invoke(yield_ref));
        code.emit(Opcode::LoadLocal(1));
        code.emit(Opcode::MonitorEnter);
        code.emit(Opcode::LoadLocal(1));
        code.emit(Opcode::MonitorExit);
        code.emit(Opcode::LoadLocal(0));
        code.emit(Opcode::MonitorExit);
        code.emit(Opcode::Return);
        static_method(table, name, 2, 2, code)
    }

    let a_main = cross_lock(&mut table, "a");
    let b_main = cross_lock(&mut table, "b");

    let mut vm = Vm::new(Box::new(table));
    let m1 = vm.runtime.heap.alloc_object("X");
    let m2 = vm.runtime.heap.alloc_object("Y");
    let a = vm
        .spawn(&a_main, &[Value::Reference(m1), Value::Reference(m2)])
        .unwrap();
    let b = vm
        .spawn(&b_main, &[Value::Reference(m2), Value::Reference(m1)])
        .unwrap();
    vm.run();

    // both contexts are blocked on each other's monitor and stay alive
    assert_eq!(vm.active_count(), 2);
    assert_eq!(vm.context(a).unwrap().state, RunState::Pausing);
    assert_eq!(vm.context(a).unwrap().pause_reason, Some("monitorEnter"));
    assert_eq!(vm.context(b).unwrap().state, RunState::Pausing);
    assert_eq!(vm.monitor(m1).unwrap().owner(), Some(a));
    assert_eq!(vm.monitor(m2).unwrap().owner(), Some(b));
}
