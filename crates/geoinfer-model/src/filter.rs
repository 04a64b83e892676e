use std::str::FromStr;

use geoinfer_core::{
    DType, FieldSize, IOName, ModelError, ModelResult, Raster, Region, Shape, Tensor, TensorSpec,
};

use crate::{FullImageFilter, InputBinding, ModelBase, OutputBinding, PatchFilter};

/// Geometry of the raster a filter produces.
#[derive(Clone, Debug, PartialEq)]
pub struct OutputInformation {
    pub size: FieldSize,
    pub origin: [f64; 2],
    pub spacing: [f64; 2],
    /// Number of bands each output tensor contributes, in output order.
    pub channels: Vec<usize>,
    /// Height of the row bands the output is best streamed in.
    pub block_height: usize,
}

impl OutputInformation {
    pub fn bands(&self) -> usize {
        self.channels.iter().sum()
    }

    pub fn region(&self) -> Region {
        Region::whole(self.size)
    }
}

/// Configure, introspect, execute and report: the capabilities every
/// inference filter offers.
pub trait ModelFilter<'a> {
    fn base(&self) -> &ModelBase<'a>;
    fn base_mut(&mut self) -> &mut ModelBase<'a>;

    /// Introspects the model and derives the output geometry.
    fn generate_output_information(&mut self) -> ModelResult<OutputInformation>;

    fn output_information(&self) -> Option<&OutputInformation>;

    /// Computes one region of the output raster.
    fn generate_region(&mut self, region: Region) -> ModelResult<Raster>;

    fn generate_data(&mut self) -> ModelResult<Raster> {
        let region = self
            .output_information()
            .map(OutputInformation::region)
            .ok_or_else(not_introspected)?;
        self.generate_region(region)
    }

    fn debug_report(&self, inputs: &[(IOName, Tensor)]) -> String {
        self.base().generate_debug_report(inputs)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterMode {
    Patch,
    FullImage,
}

impl FromStr for FilterMode {
    type Err = ModelError;

    fn from_str(s: &str) -> ModelResult<Self> {
        match s {
            "patch" => Ok(Self::Patch),
            "full" | "full-image" => Ok(Self::FullImage),
            other => Err(ModelError::configuration(format!(
                "unknown filter mode `{other}` (expected patch or full)"
            ))),
        }
    }
}

#[derive(Clone, Debug)]
pub enum InferenceFilter<'a> {
    Patch(PatchFilter<'a>),
    FullImage(FullImageFilter<'a>),
}

impl<'a> InferenceFilter<'a> {
    pub fn new(mode: FilterMode, base: ModelBase<'a>) -> Self {
        match mode {
            FilterMode::Patch => Self::Patch(PatchFilter::new(base)),
            FilterMode::FullImage => Self::FullImage(FullImageFilter::new(base)),
        }
    }

    pub fn mode(&self) -> FilterMode {
        match self {
            Self::Patch(_) => FilterMode::Patch,
            Self::FullImage(_) => FilterMode::FullImage,
        }
    }
}

macro_rules! dispatch {
    ($self:ident, $f:ident => $body:expr) => {
        match $self {
            InferenceFilter::Patch($f) => $body,
            InferenceFilter::FullImage($f) => $body,
        }
    };
}

impl<'a> ModelFilter<'a> for InferenceFilter<'a> {
    fn base(&self) -> &ModelBase<'a> {
        dispatch!(self, f => f.base())
    }
    fn base_mut(&mut self) -> &mut ModelBase<'a> {
        dispatch!(self, f => f.base_mut())
    }
    fn generate_output_information(&mut self) -> ModelResult<OutputInformation> {
        dispatch!(self, f => f.generate_output_information())
    }
    fn output_information(&self) -> Option<&OutputInformation> {
        dispatch!(self, f => f.output_information())
    }
    fn generate_region(&mut self, region: Region) -> ModelResult<Raster> {
        dispatch!(self, f => f.generate_region(region))
    }
}

pub(crate) fn not_introspected() -> ModelError {
    ModelError::configuration("output information has not been generated")
}

/// Expression field shared by every output.
pub(crate) fn common_expression_field(outputs: &[OutputBinding]) -> ModelResult<FieldSize> {
    let first = outputs
        .first()
        .ok_or_else(|| ModelError::configuration("at least one output tensor is required"))?;
    let field = first.expression_field;
    if field.is_empty() {
        return Err(ModelError::configuration(format!(
            "expression field of `{}` is empty",
            first.tensor
        )));
    }
    if let Some(other) = outputs.iter().find(|o| o.expression_field != field) {
        return Err(ModelError::configuration(format!(
            "expression fields must all be equal: `{}` is {field}, `{}` is {}",
            first.tensor, other.tensor, other.expression_field
        )));
    }
    Ok(field)
}

/// Checks an input patch `[1, h, w, bands]` agrees with the declared spec.
pub(crate) fn check_input(binding: &InputBinding<'_>, spec: &TensorSpec) -> ModelResult<()> {
    let name = binding.placeholder.as_str();
    if spec.dtype == DType::F16 {
        return Err(ModelError::introspection(name, "f16 placeholders are not supported"));
    }
    if spec.rank != 4 {
        return Err(ModelError::introspection(
            name,
            format!("expected a rank 4 placeholder, declared {}", spec.shape_string()),
        ));
    }
    let rf = binding.receptive_field;
    let expected = [rf.height, rf.width, binding.image.bands()];
    for (axis, want) in [1, 2, 3].into_iter().zip(expected) {
        if let Some(got) = spec.dim(axis) {
            if got != want {
                return Err(ModelError::configuration(format!(
                    "placeholder `{name}` declares {} but receptive field {rf} with {} bands needs [?, {}, {}, {}]",
                    spec.shape_string(),
                    binding.image.bands(),
                    rf.height,
                    rf.width,
                    binding.image.bands()
                )));
            }
        }
    }
    Ok(())
}

/// Bands an output tensor contributes to the output raster.
pub(crate) fn output_channels(spec: &TensorSpec, field: FieldSize) -> ModelResult<usize> {
    let name = spec.name.as_str();
    let channels = match spec.rank {
        4 => spec.dim(3),
        3 => Some(1),
        2 if field == FieldSize::new(1, 1) => spec.dim(1),
        2 => {
            return Err(ModelError::introspection(
                name,
                format!("a rank 2 output can only fill a 1x1 expression field, got {field}"),
            ))
        }
        _ => {
            return Err(ModelError::introspection(
                name,
                format!("unsupported output shape {}", spec.shape_string()),
            ))
        }
    };
    match channels {
        Some(c) if c > 0 => Ok(c),
        _ => Err(ModelError::introspection(
            name,
            format!("cannot infer the channel count from {}", spec.shape_string()),
        )),
    }
}

/// Packs `field` pixels of `image` starting at `start` into `[1, h, w, bands]`.
/// Pixels outside the image read `padding`.
pub(crate) fn pack_patch(
    image: &Raster,
    start: [i64; 2],
    field: FieldSize,
    padding: f32,
    dtype: DType,
) -> ModelResult<Tensor> {
    let bands = image.bands();
    let mut samples = Vec::with_capacity(field.area() * bands);
    for y in 0..field.height as i64 {
        for x in 0..field.width as i64 {
            match image.checked_pixel(start[0] + x, start[1] + y) {
                Some(px) => samples.extend_from_slice(px),
                None => samples.extend(std::iter::repeat(padding).take(bands)),
            }
        }
    }
    let shape = Shape::from_slice(&[1, field.height, field.width, bands]);
    Tensor::from_f32_samples(dtype, shape, &samples)
        .map_err(|e| ModelError::execution(format!("{e:#}")))
}

/// Writes the output tensors of one run, covering `field` pixels from
/// `(bx, by)` in output coordinates, into `tile` which covers `region`.
pub(crate) fn scatter(
    tile: &mut Raster,
    region: Region,
    origin: [usize; 2],
    field: FieldSize,
    outputs: &[Tensor],
    names: &[IOName],
    channels: &[usize],
) -> ModelResult<()> {
    let [bx, by] = origin;
    let mut offset = 0;
    for ((tensor, name), &ch) in outputs.iter().zip(names).zip(channels) {
        let data = tensor
            .to_f32_vec()
            .map_err(|e| ModelError::execution(format!("output `{name}`: {e:#}")))?;
        if data.len() != field.area() * ch {
            return Err(ModelError::execution(format!(
                "output `{name}` has {} elements, expected {} for expression field {field} with {ch} channels",
                data.len(),
                field.area() * ch
            )));
        }
        for yy in 0..field.height {
            let gy = by + yy;
            if gy < region.y || gy >= region.y + region.height {
                continue;
            }
            for xx in 0..field.width {
                let gx = bx + xx;
                if gx < region.x || gx >= region.x + region.width {
                    continue;
                }
                let src = (yy * field.width + xx) * ch;
                let px = tile.pixel_mut(gx - region.x, gy - region.y);
                px[offset..offset + ch].copy_from_slice(&data[src..src + ch]);
            }
        }
        offset += ch;
    }
    Ok(())
}

/// Empty tile covering `region` of the output grid.
pub(crate) fn output_tile(info: &OutputInformation, region: Region) -> Raster {
    let origin = [
        info.origin[0] + region.x as f64 * info.spacing[0],
        info.origin[1] + region.y as f64 * info.spacing[1],
    ];
    Raster::filled(region.width, region.height, info.bands(), 0.0).with_geometry(origin, info.spacing)
}
