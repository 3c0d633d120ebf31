use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};
use rand::{RngCore, SeedableRng};

use logicgrid::{
    levels, Circuit, CircuitBuilder, CircuitDocument, Element, ElementId, Registry, Signal,
};

fn full_adder() -> CircuitDocument {
    let mut builder = CircuitBuilder::new();
    for name in ["A", "B", "Cin"] {
        builder.input(name).unwrap();
    }
    builder.gate("ab", Element::xor(), &["A", "B"]).unwrap();
    builder.gate("sum", Element::xor(), &["ab", "Cin"]).unwrap();
    builder.gate("and1", Element::and(), &["A", "B"]).unwrap();
    builder.gate("and2", Element::and(), &["ab", "Cin"]).unwrap();
    builder.gate("carry", Element::or(), &["and1", "and2"]).unwrap();
    builder.output("S", "sum").unwrap();
    builder.output("Cout", "carry").unwrap();
    builder.build().to_document()
}

fn registry() -> Registry {
    let mut registry = Registry::with_builtins();
    registry.register_composite("FullAdder", &full_adder()).unwrap();
    registry
}

/// A ripple-carry adder, returned with its `a` and `b` input ids (LSB first).
fn ripple_adder<const BITS: usize>(
    registry: &Registry,
) -> (Circuit, Vec<ElementId>, Vec<ElementId>) {
    let mut builder = CircuitBuilder::new();
    builder.input("cin").unwrap();
    let mut a = Vec::with_capacity(BITS);
    let mut b = Vec::with_capacity(BITS);
    for i in 0..BITS {
        a.push(builder.input(&format!("a{i}")).unwrap());
        b.push(builder.input(&format!("b{i}")).unwrap());
    }
    for i in 0..BITS {
        let adder = format!("fa{i}");
        let (in_a, in_b) = (format!("a{i}"), format!("b{i}"));
        builder
            .gate(&adder, registry.create("FullAdder").unwrap(), &[in_a.as_str(), in_b.as_str()])
            .unwrap();
        let carry = if i == 0 { ("cin".to_string(), 0) } else { (format!("fa{}", i - 1), 1) };
        builder.connect((carry.0.as_str(), carry.1), (adder.as_str(), 2)).unwrap();
        builder.output(&format!("s{i}"), &adder).unwrap();
    }
    let last = format!("fa{}", BITS - 1);
    builder.output_from("cout", (last.as_str(), 1)).unwrap();
    (builder.build(), a, b)
}

pub fn adder_bench<const BITS: usize>(c: &mut Criterion) {
    if BITS > 32 {
        panic!("Too large an adder!")
    };
    let name = format!("{BITS}-bit adder");
    let (mut circuit, a, b) = ripple_adder::<BITS>(&registry());
    c.bench_function(&name, |bench| {
        let mut rng = rand::rngs::StdRng::from_entropy();
        bench.iter_batched(
            move || rng.next_u64(),
            |input| {
                let assignment: Vec<(ElementId, Signal)> = (0..BITS)
                    .flat_map(|i| {
                        [
                            (a[i], Signal::from(input & (1 << i) != 0)),
                            (b[i], Signal::from(input & (1 << (i + 32)) != 0)),
                        ]
                    })
                    .collect();
                circuit.evaluate(&assignment).unwrap()
            },
            criterion::BatchSize::SmallInput,
        )
    });
}

fn adder_benches(c: &mut Criterion) {
    adder_bench::<4>(c);
    adder_bench::<8>(c);
    adder_bench::<16>(c);
}

fn auto_test_benches(c: &mut Criterion) {
    let registry = registry();
    let mut builder = CircuitBuilder::new();
    for name in ["A", "B", "Cin"] {
        builder.input(name).unwrap();
    }
    builder
        .gate("adder", registry.create("FullAdder").unwrap(), &["A", "B", "Cin"])
        .unwrap();
    builder.output("S", "adder").unwrap();
    builder.output_from("Cout", ("adder", 1)).unwrap();
    let mut circuit = builder.build();
    circuit.set_level(Arc::new(levels::find("6").unwrap().unwrap()));

    c.bench_function("full adder auto-test", |bench| {
        bench.iter(|| assert!(circuit.auto_test().is_empty()))
    });
}

criterion_group!(benches, adder_benches, auto_test_benches);
criterion_main!(benches);
