use anyhow::{Context, Result};
use growth::prelude::Polyline;
use polars::prelude::*;
use std::fs::{self, File};
use std::path::Path;

/// Write layers to `out`; the extension picks the format.
///
/// `.csv` and `.parquet` get one row per vertex (`layer, vertex, x, y, z`).
/// Anything else gets `{"layers": [[[x, y, z], ...], ...]}` as JSON.
pub fn write_layers(out: &Path, layers: &[Polyline]) -> Result<()> {
    if let Some(parent) = out.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating output dir {}", parent.display()))?;
        }
    }
    match out.extension().and_then(|ext| ext.to_str()) {
        Some("csv") => {
            let mut df = vertex_frame(layers)?;
            let mut file =
                File::create(out).with_context(|| format!("creating {}", out.display()))?;
            CsvWriter::new(&mut file)
                .include_header(true)
                .finish(&mut df)?;
        }
        Some("parquet") => {
            let mut df = vertex_frame(layers)?;
            let file = File::create(out).with_context(|| format!("creating {}", out.display()))?;
            ParquetWriter::new(file).finish(&mut df)?;
        }
        _ => {
            let doc = serde_json::json!({ "layers": layers });
            fs::write(out, serde_json::to_vec_pretty(&doc)?)
                .with_context(|| format!("writing {}", out.display()))?;
        }
    }
    tracing::debug!(out = %out.display(), layers = layers.len(), "layers written");
    Ok(())
}

fn vertex_frame(layers: &[Polyline]) -> Result<DataFrame> {
    let rows: usize = layers.iter().map(Polyline::point_count).sum();
    let mut layer = Vec::with_capacity(rows);
    let mut vertex = Vec::with_capacity(rows);
    let (mut x, mut y, mut z) = (
        Vec::with_capacity(rows),
        Vec::with_capacity(rows),
        Vec::with_capacity(rows),
    );
    for (li, curve) in layers.iter().enumerate() {
        for (vi, p) in curve.points().iter().enumerate() {
            layer.push(li as u32);
            vertex.push(vi as u32);
            x.push(p.x);
            y.push(p.y);
            z.push(p.z);
        }
    }
    let df = df!(
        "layer" => layer,
        "vertex" => vertex,
        "x" => x,
        "y" => y,
        "z" => z,
    )?;
    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;
    use growth::prelude::Point3;
    use tempfile::tempdir;

    fn sample() -> Vec<Polyline> {
        vec![
            Polyline::line(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0)),
            Polyline::new(vec![
                Point3::new(0.0, 0.0, 1.0),
                Point3::new(1.0, 1.0, 1.0),
                Point3::new(2.0, 0.0, 1.0),
            ]),
        ]
    }

    #[test]
    fn json_output_lists_layers_as_point_arrays() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("runs").join("layers.json");
        write_layers(&out, &sample()).unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&fs::read(&out).unwrap()).unwrap();
        let layers = parsed["layers"].as_array().unwrap();
        assert_eq!(layers.len(), 2);
        assert_eq!(layers[1][1], serde_json::json!([1.0, 1.0, 1.0]));
    }

    #[test]
    fn csv_output_has_one_row_per_vertex() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("layers.csv");
        write_layers(&out, &sample()).unwrap();
        let text = fs::read_to_string(&out).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("layer,vertex,x,y,z"));
        let rows: Vec<&str> = lines.collect();
        assert_eq!(rows.len(), 5);
        assert!(rows[4].starts_with("1,2,"));
    }

    #[test]
    fn frame_columns_line_up() {
        let df = vertex_frame(&sample()).unwrap();
        assert_eq!(df.shape(), (5, 5));
        let z = df.column("z").unwrap().f64().unwrap();
        assert_eq!(z.get(2), Some(1.0));
    }
}
