//! End-to-end tests across the whole workspace: synchronized methods,
//! guest-spawned threads, and monitor release on unwinding.

use bytecode_system::{
    CodeChunk, Constant, ExceptionHandler, MethodInfo, MethodSel, MethodTable, Opcode,
};
use core_types::{Kind, Value};
use integration_tests::static_method;
use interpreter::Vm;

/// increment(recv, arr): synchronized instance method bumping arr[0].
fn register_sync_increment(table: &mut MethodTable) -> MethodSel {
    let mut code = CodeChunk::new();
    let c0 = code.add_constant(Constant::Int(0));
    let c1 = code.add_constant(Constant::Int(1));
    code.emit(Opcode::LoadLocal(1));
    code.emit(Opcode::LoadConstant(c0));
    code.emit(Opcode::LoadLocal(1));
    code.emit(Opcode::LoadConstant(c0));
    code.emit(Opcode::ArrayGet);
    code.emit(Opcode::LoadConstant(c1));
    code.emit(Opcode::Add);
    code.emit(Opcode::ArraySet);
    code.emit(Opcode::Return);
    table.register(
        MethodInfo::new("d/Obj", "increment", "([I)V")
            .with_synchronized(true)
            .with_consumed_slots(2)
            .with_code(code),
    )
}

/// worker(recv, arr): call increment(recv, arr) `n` times.
fn register_worker(table: &mut MethodTable, inc: MethodSel, n: i32) -> MethodSel {
    let mut code = CodeChunk::new();
    let c0 = code.add_constant(Constant::Int(0));
    let cn = code.add_constant(Constant::Int(n));
    let inc_ref = code.add_method_ref(inc);
    code.emit(Opcode::LoadConstant(c0)); // 0
    code.emit(Opcode::StoreLocal(2)); // 1
    code.emit(Opcode::LoadLocal(2)); // 2: loop head
    code.emit(Opcode::LoadConstant(cn)); // 3
    code.emit(Opcode::IntLt); // 4
    code.emit(Opcode::JumpIfZero(11)); // 5
    code.emit(Opcode::LoadLocal(0)); // 6
    code.emit(Opcode::LoadLocal(1)); // 7
    code.emit(Opcode::Invoke(inc_ref)); // 8
    code.emit(Opcode::IncLocal(2, 1)); // 9
    code.emit(Opcode::Jump(2)); // 10
    code.emit(Opcode::Return); // 11
    static_method(table, "worker", 2, 3, 0, code)
}

#[test]
fn test_synchronized_instance_method_serializes_increments() {
    let mut table = MethodTable::new();
    let inc = register_sync_increment(&mut table);
    let worker = register_worker(&mut table, inc, 100);

    // a tight step budget forces interleaving between the two workers
    let mut vm = Vm::new(Box::new(table)).with_step_budget(37);
    let recv = vm.runtime.heap.alloc_ref_array("d/Obj", 0);
    let arr = vm.runtime.heap.alloc_primitive_array(Kind::Int, 1);
    let args = [Value::Reference(recv), Value::Reference(arr)];
    vm.spawn(&worker, &args).unwrap();
    vm.spawn(&worker, &args).unwrap();
    vm.run();

    assert_eq!(vm.active_count(), 0);
    assert_eq!(vm.runtime.heap.get(arr).array_get(0), Some(Value::Int(200)));
    let monitor = vm.monitor(recv).expect("receiver monitor created");
    assert_eq!(monitor.owner(), None);
    assert_eq!(monitor.level(), 0);
    assert_eq!(monitor.ready_len(), 0);
}

#[test]
fn test_static_synchronized_method_locks_class_object() {
    let mut table = MethodTable::new();

    let mut code = CodeChunk::new();
    let c0 = code.add_constant(Constant::Int(0));
    let c1 = code.add_constant(Constant::Int(1));
    code.emit(Opcode::LoadLocal(0));
    code.emit(Opcode::LoadConstant(c0));
    code.emit(Opcode::LoadLocal(0));
    code.emit(Opcode::LoadConstant(c0));
    code.emit(Opcode::ArrayGet);
    code.emit(Opcode::LoadConstant(c1));
    code.emit(Opcode::Add);
    code.emit(Opcode::ArraySet);
    code.emit(Opcode::Return);
    let sinc = table.register(
        MethodInfo::new("d/S", "increment", "([I)V")
            .with_static(true)
            .with_synchronized(true)
            .with_consumed_slots(1)
            .with_code(code),
    );

    let mut worker = CodeChunk::new();
    let c0 = worker.add_constant(Constant::Int(0));
    let cn = worker.add_constant(Constant::Int(50));
    let sinc_ref = worker.add_method_ref(sinc);
    worker.emit(Opcode::LoadConstant(c0)); // 0
    worker.emit(Opcode::StoreLocal(1)); // 1
    worker.emit(Opcode::LoadLocal(1)); // 2
    worker.emit(Opcode::LoadConstant(cn)); // 3
    worker.emit(Opcode::IntLt); // 4
    worker.emit(Opcode::JumpIfZero(10)); // 5
    worker.emit(Opcode::LoadLocal(0)); // 6
    worker.emit(Opcode::Invoke(sinc_ref)); // 7
    worker.emit(Opcode::IncLocal(1, 1)); // 8
    worker.emit(Opcode::Jump(2)); // 9
    worker.emit(Opcode::Return); // 10
    let worker = static_method(&mut table, "worker", 1, 2, 0, worker);

    let mut vm = Vm::new(Box::new(table)).with_step_budget(23);
    let arr = vm.runtime.heap.alloc_primitive_array(Kind::Int, 1);
    vm.spawn(&worker, &[Value::Reference(arr)]).unwrap();
    vm.spawn(&worker, &[Value::Reference(arr)]).unwrap();
    vm.run();

    assert_eq!(vm.runtime.heap.get(arr).array_get(0), Some(Value::Int(100)));
    let class_obj = vm.runtime.class_object("d/S");
    let monitor = vm.monitor(class_obj).expect("class monitor created");
    assert_eq!(monitor.owner(), None);
    assert_eq!(monitor.level(), 0);
}

#[test]
fn test_unwinding_releases_synchronized_monitor() {
    let mut table = MethodTable::new();

    // synchronized method that throws
    let mut thrower = CodeChunk::new();
    let boom = thrower.add_class_ref("d/Boom");
    thrower.emit(Opcode::New(boom));
    thrower.emit(Opcode::Throw);
    let thrower = table.register(
        MethodInfo::new("d/Obj", "explode", "()V")
            .with_synchronized(true)
            .with_consumed_slots(1)
            .with_code(thrower),
    );

    let mut main = CodeChunk::new();
    let c0 = main.add_constant(Constant::Int(0));
    let c1 = main.add_constant(Constant::Int(1));
    let thrower_ref = main.add_method_ref(thrower);
    main.emit(Opcode::LoadLocal(0)); // 0: receiver
    main.emit(Opcode::Invoke(thrower_ref)); // 1
    main.emit(Opcode::Return); // 2
    main.emit(Opcode::Pop); // 3: handler
    main.emit(Opcode::LoadLocal(1)); // 4
    main.emit(Opcode::LoadConstant(c0)); // 5
    main.emit(Opcode::LoadConstant(c1)); // 6
    main.emit(Opcode::ArraySet); // 7
    main.emit(Opcode::Return); // 8
    main.add_handler(ExceptionHandler {
        start: 0,
        end: 2,
        handler: 3,
        class_name: Some("d/Boom".to_string()),
    });
    let main = static_method(&mut table, "main", 2, 2, 0, main);

    let mut vm = Vm::new(Box::new(table));
    let recv = vm.runtime.heap.alloc_ref_array("d/Obj", 0);
    let arr = vm.runtime.heap.alloc_primitive_array(Kind::Int, 1);
    vm.spawn(&main, &[Value::Reference(recv), Value::Reference(arr)])
        .unwrap();
    vm.run();

    // the handler ran, and the synchronized frame's monitor was released
    // during unwinding
    assert_eq!(vm.runtime.heap.get(arr).array_get(0), Some(Value::Int(1)));
    let monitor = vm.monitor(recv).expect("receiver monitor created");
    assert_eq!(monitor.owner(), None);
    assert_eq!(monitor.level(), 0);
    assert_eq!(vm.active_count(), 0);
}

#[test]
fn test_guest_spawned_threads_share_a_monitor() {
    let mut table = MethodTable::new();

    // Worker.run(): lock self, bump self[0] (the worker doubles as an int
    // cell via a reference array holding an int value)
    let mut run = CodeChunk::new();
    let c0 = run.add_constant(Constant::Int(0));
    let c1 = run.add_constant(Constant::Int(1));
    run.emit(Opcode::LoadLocal(0));
    run.emit(Opcode::MonitorEnter);
    run.emit(Opcode::LoadLocal(0));
    run.emit(Opcode::LoadConstant(c0));
    run.emit(Opcode::LoadLocal(0));
    run.emit(Opcode::LoadConstant(c0));
    run.emit(Opcode::ArrayGet);
    run.emit(Opcode::LoadConstant(c1));
    run.emit(Opcode::Add);
    run.emit(Opcode::ArraySet);
    run.emit(Opcode::LoadLocal(0));
    run.emit(Opcode::MonitorExit);
    run.emit(Opcode::Return);
    table.register(
        MethodInfo::new("d/Worker", "run", "()V")
            .with_consumed_slots(1)
            .with_code(run),
    );

    // main(worker): start the same worker object twice
    let mut main = CodeChunk::new();
    let start_ref = main.add_method_ref(MethodSel::new("java/lang/Thread", "start", "()V"));
    main.emit(Opcode::LoadLocal(0));
    main.emit(Opcode::Invoke(start_ref));
    main.emit(Opcode::LoadLocal(0));
    main.emit(Opcode::Invoke(start_ref));
    main.emit(Opcode::Return);
    let main = static_method(&mut table, "main", 1, 1, 0, main);

    let mut vm = Vm::new(Box::new(table));
    let worker = vm.runtime.heap.alloc_ref_array("d/Worker", 1);
    vm.runtime
        .heap
        .get_mut(worker)
        .array_set(0, Value::Int(0));
    vm.spawn(&main, &[Value::Reference(worker)]).unwrap();
    vm.run();

    assert_eq!(vm.active_count(), 0);
    assert_eq!(
        vm.runtime.heap.get(worker).array_get(0),
        Some(Value::Int(2))
    );
    let monitor = vm.monitor(worker).expect("worker monitor created");
    assert_eq!(monitor.owner(), None);
    assert_eq!(monitor.level(), 0);
}
