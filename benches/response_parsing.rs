use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::json;
use video_quiz_api::llm::quiz_generation::build_prompt;
use video_quiz_api::llm::response::{parse_quiz_response, sanitize_response};
use video_quiz_api::{canonicalize_video_url, GenerationMode};

fn multi_question_answer() -> String {
    let questions: Vec<_> = (1..=10)
        .map(|i| {
            json!({
                "question_title": format!("What happens in step {}?", i),
                "question_options": ["Nothing", "Something", "Everything", "It depends"],
                "answer": "It depends"
            })
        })
        .collect();
    let body = json!({
        "title": "Benchmark Quiz",
        "description": "Ten questions about nothing in particular",
        "questions": questions
    });
    format!("Here is the quiz you asked for:\n```json\n{}\n```\n", body)
}

fn bench_response_parsing(c: &mut Criterion) {
    let raw = multi_question_answer();

    c.bench_function("sanitize_fenced_response", |b| {
        b.iter(|| black_box(sanitize_response(black_box(&raw))))
    });

    c.bench_function("parse_multi_question_response", |b| {
        b.iter(|| black_box(parse_quiz_response(GenerationMode::MultiQuestion, black_box(&raw))))
    });

    let single = json!({
        "title": "Single",
        "description": "One question",
        "question": "Which one?",
        "answers": ["A", "B", "C", "D"],
        "correct_answer": "C"
    })
    .to_string();
    c.bench_function("parse_single_question_response", |b| {
        b.iter(|| black_box(parse_quiz_response(GenerationMode::SingleQuestion, black_box(&single))))
    });
}

fn bench_request_preparation(c: &mut Criterion) {
    c.bench_function("canonicalize_short_link", |b| {
        b.iter(|| black_box(canonicalize_video_url(black_box("https://youtu.be/dQw4w9WgXcQ?t=10"))))
    });

    let transcript = "word ".repeat(5_000);
    c.bench_function("build_multi_question_prompt", |b| {
        b.iter(|| black_box(build_prompt(GenerationMode::MultiQuestion, black_box(&transcript))))
    });
}

criterion_group!(benches, bench_response_parsing, bench_request_preparation);
criterion_main!(benches);
