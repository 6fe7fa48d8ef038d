use std::collections::BTreeMap;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use examguard_core::model::{Question, QuestionKind};
use examguard_core::scoring::{grade, percentage};

fn make_questions(n: usize) -> Vec<Question> {
    (0..n)
        .map(|i| Question {
            id: format!("q{i}"),
            prompt: format!("Question {i}"),
            kind: QuestionKind::MultipleChoice,
            options: vec!["A".into(), "B".into(), "C".into(), "D".into()],
            correct_answer: ["A", "B", "C", "D"][i % 4].to_string(),
            marks: (i % 3) as u32 + 1,
        })
        .collect()
}

fn make_answers(n: usize) -> BTreeMap<String, String> {
    // every other question answered, half of those correctly
    (0..n)
        .step_by(2)
        .map(|i| {
            let value = if i % 4 == 0 { "A" } else { "D" };
            (format!("q{i}"), value.to_string())
        })
        .collect()
}

fn bench_grade(c: &mut Criterion) {
    let mut group = c.benchmark_group("grade");

    for n in [10, 100, 1000] {
        let questions = make_questions(n);
        let answers = make_answers(n);
        group.bench_function(format!("questions={n}"), |b| {
            b.iter(|| grade(black_box(&answers), black_box(&questions)))
        });
    }

    group.finish();
}

fn bench_percentage(c: &mut Criterion) {
    c.bench_function("percentage", |b| {
        b.iter(|| percentage(black_box(1), black_box(3)))
    });
}

criterion_group!(benches, bench_grade, bench_percentage);
criterion_main!(benches);
