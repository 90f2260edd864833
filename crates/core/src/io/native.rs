//! GeoTIFF reading/writing on top of the `tiff` crate
//!
//! Georeferencing is carried in the standard GeoTIFF tags:
//! ModelPixelScale (33550) + ModelTiepoint (33922) for the geotransform,
//! the GeoKey directory (34735) for the EPSG projection, and GDAL_NODATA
//! (42113) for the nodata value.

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster, RasterElement};
use std::fs::File;
use std::io::{BufWriter, Read, Seek, Write};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::encoder::colortype::{ColorType, Gray32Float, Gray8};
use tiff::encoder::{TiffEncoder, TiffValue};
use tiff::tags::Tag;

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const GEO_KEY_DIRECTORY: u16 = 34735;
const GDAL_NODATA: u16 = 42113;

const GT_MODEL_TYPE: u32 = 1024;
const GT_RASTER_TYPE: u32 = 1025;
const GEOGRAPHIC_TYPE: u32 = 2048;
const PROJECTED_CS_TYPE: u32 = 3072;

fn tag(code: u16) -> Tag {
    Tag::from_u16_exhaustive(code)
}

/// Read band 1 of a GeoTIFF file into a Raster
pub fn read_geotiff<T, P>(path: P) -> Result<Raster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::open(path.as_ref())?;
    decode_geotiff(file)
}

/// Full Sentinel-2 tiles decode to several hundred MB per band, past the
/// `tiff` crate's default buffer limits.
fn decoder_limits() -> Limits {
    Limits::unlimited()
}

fn decode_geotiff<T, R>(reader: R) -> Result<Raster<T>>
where
    T: RasterElement,
    R: Read + Seek,
{
    let mut decoder = Decoder::new(reader)?.with_limits(decoder_limits());
    let (width, height) = decoder.dimensions()?;
    let rows = height as usize;
    let cols = width as usize;

    let data: Vec<T> = match decoder.read_image()? {
        DecodingResult::F32(buf) => cast_all(&buf),
        DecodingResult::F64(buf) => cast_all(&buf),
        DecodingResult::U8(buf) => cast_all(&buf),
        DecodingResult::U16(buf) => cast_all(&buf),
        DecodingResult::U32(buf) => cast_all(&buf),
        DecodingResult::I8(buf) => cast_all(&buf),
        DecodingResult::I16(buf) => cast_all(&buf),
        DecodingResult::I32(buf) => cast_all(&buf),
        _ => return Err(Error::UnsupportedDataType("unsupported TIFF sample format".into())),
    };

    // Multi-sample images decode interleaved; only single-band files are expected here.
    if data.len() != rows * cols {
        return Err(Error::UnsupportedDataType(format!(
            "expected a single-band image, got {} samples for {}x{} pixels",
            data.len(),
            cols,
            rows
        )));
    }

    let mut raster = Raster::from_vec(data, rows, cols)?;

    if let Some(transform) = read_geotransform(&mut decoder) {
        raster.set_transform(transform);
    }
    raster.set_crs(read_crs(&mut decoder));
    if let Ok(text) = decoder.get_tag_ascii_string(tag(GDAL_NODATA)) {
        raster.set_nodata(
            text.trim_end_matches('\0')
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(num_traits::cast),
        );
    }

    Ok(raster)
}

fn cast_all<S, T>(buf: &[S]) -> Vec<T>
where
    S: Copy + num_traits::NumCast,
    T: RasterElement,
{
    buf.iter()
        .map(|&v| num_traits::cast(v).unwrap_or_else(T::default_nodata))
        .collect()
}

fn read_geotransform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<GeoTransform> {
    let scale = decoder.get_tag_f64_vec(tag(MODEL_PIXEL_SCALE)).ok()?;
    let tiepoint = decoder.get_tag_f64_vec(tag(MODEL_TIEPOINT)).ok()?;

    if scale.len() < 2 || tiepoint.len() < 6 {
        return None;
    }
    // tiepoint: [I, J, K, X, Y, Z], scale: [ScaleX, ScaleY, ScaleZ]
    let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
    let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
    Some(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]))
}

fn read_crs<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<CRS> {
    let keys = decoder.get_tag_u32_vec(tag(GEO_KEY_DIRECTORY)).ok()?;
    if keys.len() < 4 {
        return None;
    }
    let num_keys = keys[3] as usize;

    keys[4..]
        .chunks_exact(4)
        .take(num_keys)
        // [key id, tag location, count, value]; location 0 means the value is inline
        .filter(|entry| entry[1] == 0 && entry[3] > 0)
        .find(|entry| entry[0] == PROJECTED_CS_TYPE || entry[0] == GEOGRAPHIC_TYPE)
        .map(|entry| CRS::from_epsg(entry[3]))
}

/// GeoTIFF tag payloads for one raster.
struct GeoTags {
    scale: Vec<f64>,
    tiepoint: Vec<f64>,
    geokeys: Vec<u16>,
    nodata: Option<String>,
}

impl GeoTags {
    fn for_raster<T: RasterElement>(raster: &Raster<T>) -> Self {
        let gt = raster.transform();

        let mut keys: Vec<[u16; 4]> = Vec::new();
        let epsg = raster.crs().and_then(|crs| {
            crs.epsg()
                .and_then(|code| u16::try_from(code).ok())
                .map(|code| (code, crs.is_geographic()))
        });
        match epsg {
            Some((code, true)) => {
                keys.push([GT_MODEL_TYPE as u16, 0, 1, 2]);
                keys.push([GT_RASTER_TYPE as u16, 0, 1, 1]);
                keys.push([GEOGRAPHIC_TYPE as u16, 0, 1, code]);
            }
            Some((code, false)) => {
                keys.push([GT_MODEL_TYPE as u16, 0, 1, 1]);
                keys.push([GT_RASTER_TYPE as u16, 0, 1, 1]);
                keys.push([PROJECTED_CS_TYPE as u16, 0, 1, code]);
            }
            None => {
                keys.push([GT_MODEL_TYPE as u16, 0, 1, 1]);
                keys.push([GT_RASTER_TYPE as u16, 0, 1, 1]);
            }
        }

        let mut geokeys = vec![1, 1, 0, keys.len() as u16];
        geokeys.extend(keys.iter().flatten());

        Self {
            scale: vec![gt.pixel_width, gt.pixel_height.abs(), 0.0],
            tiepoint: vec![0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0],
            geokeys,
            nodata: raster
                .nodata()
                .and_then(|v| v.to_f64())
                .map(|v| v.to_string()),
        }
    }
}

fn encode<C, W>(tags: &GeoTags, rows: usize, cols: usize, data: &[C::Inner], writer: W) -> Result<()>
where
    C: ColorType,
    [C::Inner]: TiffValue,
    W: Write + Seek,
{
    let mut encoder = TiffEncoder::new(writer)?;
    let mut image = encoder.new_image::<C>(cols as u32, rows as u32)?;

    image
        .encoder()
        .write_tag(tag(MODEL_PIXEL_SCALE), tags.scale.as_slice())?;
    image
        .encoder()
        .write_tag(tag(MODEL_TIEPOINT), tags.tiepoint.as_slice())?;
    image
        .encoder()
        .write_tag(tag(GEO_KEY_DIRECTORY), tags.geokeys.as_slice())?;
    if let Some(nodata) = &tags.nodata {
        image.encoder().write_tag(tag(GDAL_NODATA), nodata.as_str())?;
    }

    image.write_data(data)?;
    Ok(())
}

/// Write an `f32` raster as a single-band Float32 GeoTIFF
pub fn write_geotiff<P: AsRef<Path>>(raster: &Raster<f32>, path: P) -> Result<()> {
    let file = BufWriter::new(File::create(path.as_ref())?);
    let data: Vec<f32> = raster.data().iter().copied().collect();
    let (rows, cols) = raster.shape();
    encode::<Gray32Float, _>(&GeoTags::for_raster(raster), rows, cols, &data, file)
}

/// Write a `u8` raster (class labels) as a single-band Byte GeoTIFF
pub fn write_geotiff_u8<P: AsRef<Path>>(raster: &Raster<u8>, path: P) -> Result<()> {
    let file = BufWriter::new(File::create(path.as_ref())?);
    let data: Vec<u8> = raster.data().iter().copied().collect();
    let (rows, cols) = raster.shape();
    encode::<Gray8, _>(&GeoTags::for_raster(raster), rows, cols, &data, file)
}
