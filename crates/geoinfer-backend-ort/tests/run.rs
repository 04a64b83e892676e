mod common;

use anyhow::Result;
use common::pair_graph;
use geoinfer_backend_ort::{OrtSession, SessionOptions};
use geoinfer_core::{DType, ErrorKind, FieldSize, IOName, Raster, Session, Shape, Tensor};
use geoinfer_model::ModelBase;

fn session() -> Result<OrtSession> {
    OrtSession::from_graph(&pair_graph(), &SessionOptions::default())
}

fn x() -> Result<Tensor> {
    Tensor::from_values(Shape::from_slice(&[2, 2]), &[1.0f32, 2.0, 3.0, 4.0])
}

fn names(names: &[&str]) -> Vec<IOName> {
    names.iter().map(|n| IOName::from(*n)).collect()
}

#[test]
fn introspects_declared_shapes() -> Result<()> {
    let session = session()?;
    assert_eq!(session.engine(), "onnxruntime");

    let x = session.introspect(&IOName::from("x"))?;
    assert_eq!(x.dtype, DType::F32);
    assert_eq!(x.dims, vec![None, Some(2)]);
    let negated = session.introspect(&IOName::from("negated"))?;
    assert_eq!(negated.shape_string(), "[?, 2]");

    let err = session.introspect(&IOName::from("nope")).unwrap_err();
    assert!(err.to_string().contains("'nope'"), "{err}");
    Ok(())
}

#[test]
fn fetches_follow_requested_order() -> Result<()> {
    let session = session()?;
    let out = session.run(
        vec![(IOName::from("x"), x()?)],
        &names(&["negated", "same"]),
        &[],
    )?;
    assert_eq!(out.len(), 2);
    assert_eq!(out[0].to_vec::<f32>()?, vec![-1.0, -2.0, -3.0, -4.0]);
    assert_eq!(out[0].shape().dims(), &[2, 2]);
    assert_eq!(out[1].to_vec::<f32>()?, vec![1.0, 2.0, 3.0, 4.0]);
    Ok(())
}

#[test]
fn targets_are_computed_but_not_returned() -> Result<()> {
    let session = session()?;
    let out = session.run(
        vec![(IOName::from("x"), x()?)],
        &names(&["same"]),
        &names(&["negated"]),
    )?;
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].to_vec::<f32>()?, vec![1.0, 2.0, 3.0, 4.0]);
    Ok(())
}

#[test]
fn unknown_fetches_and_targets_are_rejected() -> Result<()> {
    let session = session()?;
    let err = session
        .run(vec![(IOName::from("x"), x()?)], &names(&["x"]), &[])
        .unwrap_err();
    assert!(err.to_string().contains("fetch 'x' is not an output"), "{err}");

    let err = session
        .run(
            vec![(IOName::from("x"), x()?)],
            &names(&["same"]),
            &names(&["init"]),
        )
        .unwrap_err();
    assert!(err.to_string().contains("target node 'init'"), "{err}");
    Ok(())
}

#[test]
fn missing_feed_keeps_the_engine_message() -> Result<()> {
    let session = session()?;
    let image = Raster::filled(2, 1, 2, 0.0);
    let mut base = ModelBase::new();
    base.set_graph(pair_graph());
    base.set_session(&session);
    base.push_input_bundle("x", FieldSize::new(2, 1), &image);
    base.push_output_bundle("same", FieldSize::new(1, 1));
    base.generate_output_information()?;

    let err = base.run_session(vec![]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Execution);
    assert!(err.to_string().contains("Missing Input: x"), "{err}");
    let report = err.report().expect("execution errors carry a report");
    assert!(report.contains("Session: onnxruntime"), "{report}");
    Ok(())
}
