use geoinfer_core::{ModelError, ModelResult, Raster, Region};
use tracing::{debug, info};

use crate::filter::{
    check_input, common_expression_field, not_introspected, output_channels, output_tile,
    pack_patch, scatter,
};
use crate::{ModelBase, ModelFilter, OutputInformation};

/// Runs the model once on every input image as a whole.
///
/// Receptive fields must equal the image sizes and the expression field is
/// the size of the output raster. The result is kept until the next call to
/// `generate_output_information`, so region requests crop it.
#[derive(Clone, Debug)]
pub struct FullImageFilter<'a> {
    base: ModelBase<'a>,
    info: Option<OutputInformation>,
    computed: Option<Raster>,
}

impl<'a> FullImageFilter<'a> {
    pub fn new(base: ModelBase<'a>) -> Self {
        Self {
            base,
            info: None,
            computed: None,
        }
    }

    fn compute(&mut self, info: &OutputInformation) -> ModelResult<Raster> {
        let inputs = self.base.input_bindings()?;
        let dtypes = self
            .base
            .model_spec()
            .ok_or_else(not_introspected)?
            .input_dtypes();
        let names = self.base.registry().output_tensors().to_vec();

        let mut feeds = Vec::with_capacity(inputs.len());
        for (binding, &dtype) in inputs.iter().zip(&dtypes) {
            let patch = pack_patch(binding.image, [0, 0], binding.receptive_field, 0.0, dtype)?;
            feeds.push((binding.placeholder.clone(), patch));
        }

        let outputs = self.base.run_session(feeds)?;
        let region = info.region();
        let mut out = output_tile(info, region);
        scatter(&mut out, region, [0, 0], info.size, &outputs, &names, &info.channels)?;
        debug!(size = %info.size, "full-image run done");
        Ok(out)
    }
}

impl<'a> ModelFilter<'a> for FullImageFilter<'a> {
    fn base(&self) -> &ModelBase<'a> {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ModelBase<'a> {
        self.info = None;
        self.computed = None;
        &mut self.base
    }

    fn generate_output_information(&mut self) -> ModelResult<OutputInformation> {
        self.info = None;
        self.computed = None;

        self.base.generate_output_information()?;
        let inputs = self.base.input_bindings()?;
        let outputs = self.base.output_bindings()?;
        let spec = self.base.model_spec().ok_or_else(not_introspected)?;

        for (binding, input_spec) in inputs.iter().zip(&spec.inputs) {
            if binding.receptive_field != binding.image.size() {
                return Err(ModelError::configuration(format!(
                    "full-image inference needs the receptive field of `{}` ({}) to equal its image size ({})",
                    binding.placeholder,
                    binding.receptive_field,
                    binding.image.size()
                )));
            }
            check_input(binding, input_spec)?;
        }
        let size = common_expression_field(&outputs)?;
        let channels = outputs
            .iter()
            .zip(&spec.outputs)
            .map(|(binding, s)| output_channels(s, binding.expression_field))
            .collect::<ModelResult<Vec<_>>>()?;

        let reference = inputs[0].image;
        let extent = reference.extent();
        let info = OutputInformation {
            size,
            origin: reference.origin(),
            spacing: [
                extent[0] / size.width as f64,
                extent[1] / size.height as f64,
            ],
            channels,
            block_height: size.height,
        };
        info!(size = %info.size, bands = info.bands(), "full-image output information");
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
        let full = match self.computed.take() {
            Some(full) => full,
            None => self.compute(&info)?,
        };
        let tile = full.crop(region);
        self.computed = Some(full);
        tile
    }
}
