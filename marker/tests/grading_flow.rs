use code_runner::kernel::scripted::{ScriptedSessions, ScriptedTransport};
use image::{DynamicImage, Rgb, RgbImage};
use marker::{DirectoryLister, MarkerError, prepare_grader};
use serial_test::serial;
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use util::test_helpers::setup_test_storage_root;

const SOLUTION: &str = r#"---
title: "Week 1"
---

Load the data.

```{r}
speed = 4
speed
```

Say hello.

```{r}
cat(hello world)
```

Draw it.

```{r}
plot(255, 0, 0)
```
"#;

fn definition(total: f64) -> String {
    format!(
        r#"{{
  "total": {total},
  "answers": [
    {{ "kind": "exact", "mark": 2, "name": "speed", "target": "[1] 4", "chunk": 0 }},
    {{ "kind": "raw_regex", "mark": 3, "name": "greeting", "sample": "\nhello   world\n", "chunk": 1 }},
    {{ "kind": "image", "mark": 5, "name": "plot", "source": {{ "file": "red.png" }} }}
  ]
}}"#
    )
}

fn submission(speed: &str, first: &str, colour: &str) -> String {
    SOLUTION
        .replace("speed = 4", &format!("speed = {speed}"))
        .replace("speed = ", &format!("{first}\nspeed = "))
        .replace("255, 0, 0", colour)
}

fn setup(total: f64) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("solution.Rmd"), SOLUTION).unwrap();
    fs::write(dir.path().join("definition.json"), definition(total)).unwrap();
    DynamicImage::ImageRgb8(RgbImage::from_pixel(20, 20, Rgb([255, 0, 0])))
        .save(dir.path().join("red.png"))
        .unwrap();

    let subs = dir.path().join("submissions");
    fs::create_dir(&subs).unwrap();
    fs::write(subs.join("alice.Rmd"), SOLUTION).unwrap();
    fs::write(subs.join("bob.Rmd"), submission("5", "", "0, 0, 255")).unwrap();
    fs::write(subs.join("carol.Rmd"), submission("4", "stop(oops)", "255, 0, 0")).unwrap();
    fs::write(subs.join("notes.txt"), "not a notebook").unwrap();
    dir
}

fn paths(dir: &Path) -> (std::path::PathBuf, std::path::PathBuf) {
    (dir.join("definition.json"), dir.join("solution.Rmd"))
}

#[tokio::test]
#[serial]
async fn test_grades_a_directory_of_submissions() {
    let _root = setup_test_storage_root();
    let dir = setup(10.0);
    let (definition, solution) = paths(dir.path());
    let sessions = ScriptedSessions::new(ScriptedTransport::toy_r);

    let grader = prepare_grader(&definition, &solution, &sessions).await.unwrap();
    let graded = grader
        .grade_all(&DirectoryLister::new(dir.path().join("submissions")), &sessions)
        .await
        .unwrap();

    let totals: Vec<(String, f64)> = graded
        .iter()
        .map(|g| {
            let report = g.result.as_ref().unwrap();
            (report.submission.clone().unwrap(), report.total)
        })
        .collect();
    assert_eq!(
        totals,
        vec![
            ("alice.Rmd".to_string(), 10.0),
            ("bob.Rmd".to_string(), 3.0),
            ("carol.Rmd".to_string(), 8.0),
        ]
    );

    let bob = graded[1].result.as_ref().unwrap();
    let awarded: Vec<(&str, f64)> = bob
        .entries
        .iter()
        .map(|e| (e.name.as_str(), e.awarded))
        .collect();
    assert_eq!(awarded, vec![("speed", 0.0), ("greeting", 3.0), ("plot", 0.0)]);
}

#[tokio::test]
#[serial]
async fn test_stop_on_error_costs_later_chunks() {
    let _root = setup_test_storage_root();
    let dir = setup(10.0);
    let (definition, solution) = paths(dir.path());
    let sessions = ScriptedSessions::new(ScriptedTransport::toy_r);

    let grader = prepare_grader(&definition, &solution, &sessions)
        .await
        .unwrap()
        .stop_on_error(true);
    let carol = grader
        .grade_path(&dir.path().join("submissions").join("carol.Rmd"), &sessions)
        .await
        .unwrap();
    assert_eq!(carol.total, 0.0);
}

#[tokio::test]
#[serial]
async fn test_wrong_total_is_a_configuration_error() {
    let _root = setup_test_storage_root();
    let dir = setup(12.0);
    let (definition, solution) = paths(dir.path());
    let sessions = ScriptedSessions::new(ScriptedTransport::toy_r);

    let err = prepare_grader(&definition, &solution, &sessions)
        .await
        .unwrap_err();
    assert!(matches!(err, MarkerError::Configuration(_)));
    assert!(err.to_string().contains("Reference solution scores 10, expected 12"));
}

#[tokio::test]
#[serial]
async fn test_missing_image_file_is_reported() {
    let _root = setup_test_storage_root();
    let dir = setup(10.0);
    fs::remove_file(dir.path().join("red.png")).unwrap();
    let (definition, solution) = paths(dir.path());
    let sessions = ScriptedSessions::new(ScriptedTransport::toy_r);

    let err = prepare_grader(&definition, &solution, &sessions)
        .await
        .unwrap_err();
    assert!(matches!(err, MarkerError::Image { .. }));
}
