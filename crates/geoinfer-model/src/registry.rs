use geoinfer_core::{FieldSize, IOName, ModelError, ModelResult, Raster, Tensor};

/// One validated input: the placeholder it feeds, what the model sees of the
/// image around each output position, and the image itself.
#[derive(Clone, Debug)]
pub struct InputBinding<'a> {
    pub placeholder: IOName,
    pub receptive_field: FieldSize,
    pub image: &'a Raster,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputBinding {
    pub tensor: IOName,
    pub expression_field: FieldSize,
}

/// Model parameters of one filter instance.
///
/// Each list may be replaced on its own, so corresponding lists can disagree
/// in length until they are bound with [`input_bindings`] and
/// [`output_bindings`]; correspondence is by index.
///
/// [`input_bindings`]: ParameterRegistry::input_bindings
/// [`output_bindings`]: ParameterRegistry::output_bindings
#[derive(Clone, Debug, Default)]
pub struct ParameterRegistry<'a> {
    input_placeholders: Vec<IOName>,
    input_receptive_fields: Vec<FieldSize>,
    input_images: Vec<&'a Raster>,
    output_tensors: Vec<IOName>,
    output_expression_fields: Vec<FieldSize>,
    target_nodes: Vec<IOName>,
    user_placeholders: Vec<(IOName, Tensor)>,
}

impl<'a> ParameterRegistry<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_input_bundle(
        &mut self,
        name: impl Into<IOName>,
        receptive_field: FieldSize,
        image: &'a Raster,
    ) {
        self.input_placeholders.push(name.into());
        self.input_receptive_fields.push(receptive_field);
        self.input_images.push(image);
    }

    pub fn push_output_bundle(&mut self, name: impl Into<IOName>, expression_field: FieldSize) {
        self.output_tensors.push(name.into());
        self.output_expression_fields.push(expression_field);
    }

    pub fn input_placeholders(&self) -> &[IOName] {
        &self.input_placeholders
    }
    pub fn set_input_placeholders(&mut self, names: Vec<IOName>) {
        self.input_placeholders = names;
    }

    pub fn input_receptive_fields(&self) -> &[FieldSize] {
        &self.input_receptive_fields
    }
    pub fn set_input_receptive_fields(&mut self, fields: Vec<FieldSize>) {
        self.input_receptive_fields = fields;
    }

    pub fn input_images(&self) -> &[&'a Raster] {
        &self.input_images
    }
    pub fn set_input_images(&mut self, images: Vec<&'a Raster>) {
        self.input_images = images;
    }

    pub fn output_tensors(&self) -> &[IOName] {
        &self.output_tensors
    }
    pub fn set_output_tensors(&mut self, names: Vec<IOName>) {
        self.output_tensors = names;
    }

    pub fn output_expression_fields(&self) -> &[FieldSize] {
        &self.output_expression_fields
    }
    pub fn set_output_expression_fields(&mut self, fields: Vec<FieldSize>) {
        self.output_expression_fields = fields;
    }

    pub fn target_nodes(&self) -> &[IOName] {
        &self.target_nodes
    }
    pub fn set_target_nodes(&mut self, names: Vec<IOName>) {
        self.target_nodes = names;
    }

    pub fn user_placeholders(&self) -> &[(IOName, Tensor)] {
        &self.user_placeholders
    }
    pub fn set_user_placeholders(&mut self, dict: Vec<(IOName, Tensor)>) {
        self.user_placeholders = dict;
    }

    pub fn input_bindings(&self) -> ModelResult<Vec<InputBinding<'a>>> {
        let images = self.input_images.len();
        check_lengths("input images", images, "input placeholders", self.input_placeholders.len())?;
        check_lengths(
            "input placeholders",
            self.input_placeholders.len(),
            "input receptive fields",
            self.input_receptive_fields.len(),
        )?;
        if images == 0 {
            return Err(ModelError::configuration("at least one input bundle is required"));
        }

        Ok(self
            .input_placeholders
            .iter()
            .zip(&self.input_receptive_fields)
            .zip(&self.input_images)
            .map(|((placeholder, field), image)| InputBinding {
                placeholder: placeholder.clone(),
                receptive_field: *field,
                image: *image,
            })
            .collect())
    }

    pub fn output_bindings(&self) -> ModelResult<Vec<OutputBinding>> {
        check_lengths(
            "output tensors",
            self.output_tensors.len(),
            "output expression fields",
            self.output_expression_fields.len(),
        )?;

        Ok(self
            .output_tensors
            .iter()
            .zip(&self.output_expression_fields)
            .map(|(tensor, field)| OutputBinding {
                tensor: tensor.clone(),
                expression_field: *field,
            })
            .collect())
    }
}

fn check_lengths(
    left: &'static str,
    left_len: usize,
    right: &'static str,
    right_len: usize,
) -> ModelResult<()> {
    if left_len != right_len {
        return Err(ModelError::LengthMismatch {
            left,
            left_len,
            right,
            right_len,
        });
    }
    Ok(())
}
