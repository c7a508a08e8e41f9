// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use pretty_assertions::assert_eq;
use std::{fs::File, io::BufReader};
use testrun_xml::{
    OutcomeKind, ReportCase, ReportCounts, ReportFormat, ReportNode, ReportOutcome, ReportSuite,
    TestRunReport,
};

#[test]
fn junit_fixture() {
    let file = File::open("tests/fixtures/junit_report.xml").expect("fixture exists");
    let report = TestRunReport::deserialize(BufReader::new(file)).expect("fixture parses");

    assert_eq!(report.name, "ci-run");
    assert_eq!(report.format, ReportFormat::TestSuites);
    assert_eq!(report.children.len(), 2);

    let ReportNode::Suite(module) = &report.children[0] else {
        panic!("expected a suite, found {:?}", report.children[0]);
    };
    assert_eq!(module.name, "ОбщийМодуль.Тесты");
    let names: Vec<_> = module.children.iter().map(ReportNode::name).collect();
    assert_eq!(
        names,
        ["СложениеЧисел", "ДелениеНаНоль", "СравнениеСтрок"]
    );

    let ReportNode::Case(division) = &module.children[1] else {
        panic!("expected a case");
    };
    assert_eq!(division.time, Some(0.3));
    assert_eq!(division.outcomes.len(), 1);
    let error = &division.outcomes[0];
    assert_eq!(error.kind, OutcomeKind::Error);
    assert_eq!(error.message.as_deref(), Some("Деление на 0"));
    assert_eq!(error.ty.as_deref(), Some("ВыполнениеКода"));
    assert_eq!(
        error.trace.as_deref(),
        Some("{ОбщийМодуль.Тесты.Модуль(42)}: Деление на 0")
    );

    let ReportNode::Case(comparison) = &module.children[2] else {
        panic!("expected a case");
    };
    assert_eq!(comparison.outcomes[0].kind, OutcomeKind::Failure);
    assert_eq!(
        comparison.outcomes[0].message.as_deref(),
        Some("Ожидали, что \"а\" равно \"б\"")
    );

    let ReportNode::Suite(catalogs) = &report.children[1] else {
        panic!("expected a suite");
    };
    assert_eq!(catalogs.name, "Catalogs.Справочники");
    let ReportNode::Case(disabled) = &catalogs.children[0] else {
        panic!("expected a case");
    };
    assert_eq!(disabled.outcomes, vec![ReportOutcome::new(OutcomeKind::Skipped)]);
}

#[test]
fn written_report_reads_back() {
    let report = sample_report();
    let xml = report.to_string().expect("serializing succeeds");
    let read_back: TestRunReport = xml.parse().expect("written report parses");
    assert_eq!(read_back, report);
}

fn sample_report() -> TestRunReport {
    let mut report = TestRunReport::new("история");
    report
        .set_project("Бухгалтерия")
        .set_counts(ReportCounts {
            tests: 4,
            started: 3,
            failures: 1,
            errors: 1,
            ignored: 1,
        })
        .set_tags(Some("smoke,fast".to_owned()), None);

    let mut passed = ReportCase::new("Тесты.Проходит");
    passed.set_class_name("Тесты").set_time(0.25);
    passed.display_name = Some("Проходит".to_owned());
    passed.context = Some("Сервер".to_owned());

    let mut failed = ReportCase::new("Тесты.Падает");
    failed.set_class_name("Тесты").set_time(1.0);
    let mut failure = ReportOutcome::new(OutcomeKind::Failure);
    failure
        .set_message("values differ: <1> & <2>")
        .set_comparison("1", "2")
        .set_trace("{Тесты.Модуль(10)}: values differ\n{ЮТест.Утверждения(5)}: assert");
    failed.add_outcome(failure);

    let mut errored = ReportCase::new("Тесты.Ошибка");
    errored.set_class_name("Тесты").set_time(0.125);
    errored.parameter_types = Some(vec!["Число".to_owned(), "Строка".to_owned()]);
    errored.unique_id = Some("[engine:yaxunit]/[test:3]".to_owned());
    errored.add_outcome(ReportOutcome::new(OutcomeKind::Error));

    let mut skipped = ReportCase::new("Тесты.Пропущен");
    skipped.ignored = true;
    skipped.add_outcome(ReportOutcome::new(OutcomeKind::Skipped));

    let mut pending = ReportCase::new("Тесты.НеЗапускался");
    pending.incomplete = true;
    pending.dynamic_test = true;

    let mut suite = ReportSuite::new("Тесты");
    suite.set_time(1.375);
    for case in [passed, failed, errored, skipped, pending] {
        suite.add_child(ReportNode::Case(case));
    }

    let mut outer = ReportSuite::new("Все");
    outer.incomplete = true;
    outer.add_child(ReportNode::Suite(suite));
    report.add_child(ReportNode::Suite(outer));
    report
}
