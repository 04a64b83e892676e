use geoinfer_core::{FieldSize, ModelError, ModelResult, Raster, Region};
use tracing::{debug, info};

use crate::filter::{
    check_input, common_expression_field, not_introspected, output_channels, output_tile,
    pack_patch, scatter,
};
use crate::{ModelBase, ModelFilter, OutputInformation};

/// Runs the model once per expression-field block of the output grid.
///
/// Each run feeds, for every input, its receptive field centred on the
/// block centre. Blocks are aligned on the whole output grid, so a pixel's
/// value does not depend on the region it was requested through.
#[derive(Clone, Debug)]
pub struct PatchFilter<'a> {
    base: ModelBase<'a>,
    output_spacing_scale: f64,
    padding_value: f32,
    block: FieldSize,
    info: Option<OutputInformation>,
}

impl<'a> PatchFilter<'a> {
    pub fn new(base: ModelBase<'a>) -> Self {
        Self {
            base,
            output_spacing_scale: 1.0,
            padding_value: 0.0,
            block: FieldSize::new(1, 1),
            info: None,
        }
    }

    pub fn output_spacing_scale(&self) -> f64 {
        self.output_spacing_scale
    }

    /// Output pixel size as a multiple of the first input's pixel size.
    pub fn set_output_spacing_scale(&mut self, scale: f64) {
        self.output_spacing_scale = scale;
        self.info = None;
    }

    pub fn padding_value(&self) -> f32 {
        self.padding_value
    }

    /// Value read for receptive-field pixels outside an input image.
    pub fn set_padding_value(&mut self, value: f32) {
        self.padding_value = value;
    }
}

impl<'a> ModelFilter<'a> for PatchFilter<'a> {
    fn base(&self) -> &ModelBase<'a> {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ModelBase<'a> {
        self.info = None;
        &mut self.base
    }

    fn generate_output_information(&mut self) -> ModelResult<OutputInformation> {
        self.info = None;
        let scale = self.output_spacing_scale;
        if !(scale.is_finite() && scale > 0.0) {
            return Err(ModelError::configuration(format!(
                "output spacing scale must be positive, got {scale}"
            )));
        }

        self.base.generate_output_information()?;
        let inputs = self.base.input_bindings()?;
        let outputs = self.base.output_bindings()?;
        let spec = self.base.model_spec().ok_or_else(not_introspected)?;

        for (binding, input_spec) in inputs.iter().zip(&spec.inputs) {
            check_input(binding, input_spec)?;
        }
        let block = common_expression_field(&outputs)?;
        let channels = outputs
            .iter()
            .zip(&spec.outputs)
            .map(|(binding, s)| output_channels(s, binding.expression_field))
            .collect::<ModelResult<Vec<_>>>()?;

        let reference = inputs[0].image;
        let spacing = reference.spacing().map(|s| s * scale);
        let size = FieldSize::new(
            (reference.width() as f64 / scale).floor() as usize,
            (reference.height() as f64 / scale).floor() as usize,
        );
        if size.is_empty() {
            return Err(ModelError::configuration(format!(
                "output of {} at scale {scale} is empty",
                reference.size()
            )));
        }

        let info = OutputInformation {
            size,
            origin: reference.origin(),
            spacing,
            channels,
            block_height: block.height,
        };
        info!(
            size = %info.size,
            bands = info.bands(),
            block = %block,
            "patch-based output information"
        );
        self.block = block;
        self.info = Some(info.clone());
        Ok(info)
    }

    fn output_information(&self) -> Option<&OutputInformation> {
        self.info.as_ref()
    }

    fn generate_region(&mut self, region: Region) -> ModelResult<Raster> {
        let info = self.info.clone().ok_or_else(not_introspected)?;
        if !region.fits_in(info.size) {
            return Err(ModelError::configuration(format!(
                "requested region {} at ({}, {}) exceeds output {}",
                region.size(),
                region.x,
                region.y,
                info.size
            )));
        }
        let inputs = self.base.input_bindings()?;
        let dtypes = self
            .base
            .model_spec()
            .ok_or_else(not_introspected)?
            .input_dtypes();
        let names = self.base.registry().output_tensors().to_vec();

        let block = self.block;
        let mut tile = output_tile(&info, region);
        if region.is_empty() {
            return Ok(tile);
        }

        let x_end = region.x + region.width;
        let y_end = region.y + region.height;
        let mut runs = 0usize;
        let mut by = region.y / block.height * block.height;
        while by < y_end {
            let mut bx = region.x / block.width * block.width;
            while bx < x_end {
                let centre = [
                    info.origin[0] + (bx as f64 + block.width as f64 / 2.0) * info.spacing[0],
                    info.origin[1] + (by as f64 + block.height as f64 / 2.0) * info.spacing[1],
                ];
                let mut feeds = Vec::with_capacity(inputs.len());
                for (binding, &dtype) in inputs.iter().zip(&dtypes) {
                    let rf = binding.receptive_field;
                    let [cx, cy] = binding.image.index_of(centre);
                    let start = [cx - (rf.width / 2) as i64, cy - (rf.height / 2) as i64];
                    let patch = pack_patch(binding.image, start, rf, self.padding_value, dtype)?;
                    feeds.push((binding.placeholder.clone(), patch));
                }

                let outputs = self.base.run_session(feeds)?;
                scatter(&mut tile, region, [bx, by], block, &outputs, &names, &info.channels)?;
                runs += 1;
                bx += block.width;
            }
            by += block.height;
        }

        debug!(
            x = region.x,
            y = region.y,
            size = %region.size(),
            runs,
            "patch-based region done"
        );
        Ok(tile)
    }
}
