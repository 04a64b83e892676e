use geoinfer_core::{IOName, Tensor};

use crate::ModelBase;

pub(crate) fn debug_report(base: &ModelBase<'_>, inputs: &[(IOName, Tensor)]) -> String {
    let mut lines = Vec::new();
    let registry = base.registry();

    match base.graph() {
        Some(graph) => lines.push(format!("Graph: {} ({} bytes)", graph.label(), graph.len())),
        None => lines.push("Graph: <unset>".to_string()),
    }
    match base.session() {
        Some(session) => lines.push(format!("Session: {}", session.engine())),
        None => lines.push("Session: <unset>".to_string()),
    }

    let placeholders = registry.input_placeholders();
    let fields = registry.input_receptive_fields();
    lines.push(format!(
        "Input placeholders ({}), receptive fields ({}), images ({}):",
        placeholders.len(),
        fields.len(),
        registry.input_images().len()
    ));
    for i in 0..placeholders.len().max(fields.len()) {
        let name = placeholders.get(i).map_or("<missing>", IOName::as_str);
        let field = fields
            .get(i)
            .map_or_else(|| "<missing>".to_string(), ToString::to_string);
        let spec = base
            .input_tensor_specs()
            .and_then(|specs| specs.get(i))
            .map(|s| format!(" declared {} {}", s.dtype, s.shape_string()))
            .unwrap_or_default();
        lines.push(format!("  #{i} {name} receptive field {field}{spec}"));
    }

    let outputs = registry.output_tensors();
    let out_fields = registry.output_expression_fields();
    lines.push(format!(
        "Output tensors ({}), expression fields ({}):",
        outputs.len(),
        out_fields.len()
    ));
    for i in 0..outputs.len().max(out_fields.len()) {
        let name = outputs.get(i).map_or("<missing>", IOName::as_str);
        let field = out_fields
            .get(i)
            .map_or_else(|| "<missing>".to_string(), ToString::to_string);
        lines.push(format!("  #{i} {name} expression field {field}"));
    }

    lines.push(format!("Target nodes: {}", join_names(registry.target_nodes().iter())));
    lines.push(format!(
        "User placeholders: {}",
        join_names(registry.user_placeholders().iter().map(|(n, _)| n))
    ));

    lines.push(format!("Feeds ({}):", inputs.len()));
    for (i, (name, tensor)) in inputs.iter().enumerate() {
        lines.push(format!(
            "  #{i} {name}: {} {} {}",
            tensor.dtype(),
            tensor.shape(),
            summarize(tensor)
        ));
    }

    lines.join("\n")
}

fn join_names<'n>(names: impl Iterator<Item = &'n IOName>) -> String {
    let names: Vec<&str> = names.map(IOName::as_str).collect();
    if names.is_empty() {
        "<none>".to_string()
    } else {
        names.join(", ")
    }
}

fn summarize(tensor: &Tensor) -> String {
    if !tensor.is_well_formed() {
        return format!(
            "malformed ({} bytes, expected {})",
            tensor.byte_len(),
            tensor.expected_byte_len()
        );
    }
    let values = match tensor.to_f32_vec() {
        Ok(values) => values,
        Err(err) => return format!("unreadable ({err})"),
    };
    if values.is_empty() {
        return "empty".to_string();
    }

    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let mut sum = 0.0f64;
    let mut nan = 0usize;
    for v in values.iter().map(|v| f64::from(*v)) {
        if v.is_nan() {
            nan += 1;
            continue;
        }
        min = min.min(v);
        max = max.max(v);
        sum += v;
    }
    let counted = values.len() - nan;
    if counted == 0 {
        return format!("all {nan} values are NaN");
    }
    let mut summary = format!("min={min} max={max} mean={}", sum / counted as f64);
    if nan > 0 {
        summary.push_str(&format!(" nan={nan}"));
    }
    summary
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use geoinfer_core::{DType, FieldSize, Raster, Shape};

    use super::*;

    #[test]
    fn reports_configuration_and_feed_statistics() {
        let image = Raster::filled(2, 2, 1, 0.0);
        let mut base = ModelBase::new();
        base.push_input_bundle("x", FieldSize::new(2, 2), &image);
        base.push_output_bundle("y", FieldSize::new(1, 1));

        let x = Tensor::from_values(Shape::from_slice(&[1, 2]), &[1.0f32, 3.0]).unwrap();
        let report = base.generate_debug_report(&[(IOName::from("x"), x)]);

        assert!(report.contains("Graph: <unset>"));
        assert!(report.contains("#0 x receptive field 2x2"));
        assert!(report.contains("#0 y expression field 1x1"));
        assert!(report.contains("x: f32 [1, 2] min=1 max=3 mean=2"), "{report}");
    }

    #[test]
    fn malformed_and_mismatched_inputs_degrade() {
        let mut base = ModelBase::new();
        base.registry_mut()
            .set_input_placeholders(vec![IOName::from("a"), IOName::from("b")]);

        let broken = Tensor::from_cpu_bytes(DType::F32, Shape::from_slice(&[4]), Bytes::from_static(&[0; 3]));
        let half = Tensor::from_cpu_bytes(DType::F16, Shape::from_slice(&[1]), Bytes::from_static(&[0; 2]));
        let report = base.generate_debug_report(&[
            (IOName::from("a"), broken),
            (IOName::from("h"), half),
        ]);

        assert!(report.contains("#1 b receptive field <missing>"));
        assert!(report.contains("malformed (3 bytes, expected 16)"));
        assert!(report.contains("unreadable"));
    }
}
