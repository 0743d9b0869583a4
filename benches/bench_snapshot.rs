use criterion::{criterion_group, criterion_main, Criterion};
use vmsnap::{
    snapshot::{
        deserializer::ObjectLoader, save_context::SaveContext, serializer::FileSaveContext,
    },
    vm::{
        bytecode::BytecodeObject,
        hash::HashData,
        heap::{BcoRef, Heap},
        opcodes::{scope, Major},
        value::Value,
    },
};
criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);

/// A chain of subroutines, each calling the next and holding a small hash.
fn build_program(heap: &mut Heap, subroutines: usize) -> BcoRef {
    let mut next = None;
    for i in (0..subroutines).rev() {
        let mut bco = BytecodeObject::new_procedure(&format!("SUB{}", i));
        bco.file_name = "bench.q".into();
        bco.add_argument("N", false);
        let mut hash = HashData::new();
        for k in 0..8 {
            hash.set(&format!("K{}", k), Value::Int(k));
        }
        let hash = heap.alloc_hash(hash);
        for line in 0..32 {
            bco.add_line_number(line);
            bco.add_instruction(Major::Push, scope::LOCAL, 0);
            bco.add_push_literal(Value::Float(line as f64));
        }
        bco.add_push_literal(Value::Hash(hash));
        if let Some(callee) = next {
            bco.add_push_literal(Value::Subroutine(callee));
        }
        next = Some(heap.alloc_bco(bco));
    }
    next.expect("at least one subroutine")
}

fn save(heap: &Heap, entry: BcoRef) -> Vec<u8> {
    let mut ctx = FileSaveContext::new(heap);
    let id = ctx.add_bco(entry).unwrap();
    let mut out = Vec::new();
    ctx.save_object_file(&mut out, id).unwrap();
    out
}

fn criterion_benchmark(c: &mut Criterion) {
    let mut heap = Heap::new();
    let entry = build_program(&mut heap, 200);
    let file = save(&heap, entry);

    c.bench_function("save object file", |b| {
        b.iter_with_large_drop(|| save(&heap, entry));
    });

    c.bench_function("load object file", |b| {
        b.iter_with_large_drop(|| {
            let mut target = Heap::new();
            ObjectLoader::new(&mut target)
                .load_object_file(&mut &file[..])
                .unwrap();
            target
        });
    });
}
