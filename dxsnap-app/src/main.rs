use std::path::PathBuf;

use dxsnap_config::{AppConfig, ConfigError, OutputFormat};
use dxsnap_core::document::{BlockDefinition, Circle, Document, Entity};
use dxsnap_core::geometry::{Point2, Point3, Vector2};
use dxsnap_io::{DocumentLoader, JsonFacade};
use dxsnap_render::{RenderOptions, render_document};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

fn main() {
    let mut args = std::env::args().skip(1);
    let mut config_override: Option<PathBuf> = None;
    let mut format_override: Option<OutputFormat> = None;
    let mut quality_override: Option<u8> = None;
    let mut output_override: Option<PathBuf> = None;
    let mut input: Option<PathBuf> = None;
    let mut demo = false;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let Some(path) = args.next() else {
                    eprintln!("`--config` 需要提供配置文件路径");
                    std::process::exit(1);
                };
                config_override = Some(PathBuf::from(path));
            }
            "--format" => {
                let Some(value) = args.next() else {
                    eprintln!("`--format` 需要提供 jpeg 或 bmp");
                    std::process::exit(1);
                };
                format_override = Some(match value.as_str() {
                    "jpeg" | "jpg" => OutputFormat::Jpeg,
                    "bmp" => OutputFormat::Bmp,
                    other => {
                        eprintln!("不支持的输出格式：{other}");
                        std::process::exit(1);
                    }
                });
            }
            "--quality" => {
                let Some(value) = args.next() else {
                    eprintln!("`--quality` 需要提供 0-100 的整数");
                    std::process::exit(1);
                };
                match value.parse::<u8>() {
                    Ok(quality) if quality <= 100 => quality_override = Some(quality),
                    _ => {
                        eprintln!("非法的 JPEG 质量：{value}");
                        std::process::exit(1);
                    }
                }
            }
            "--output" | "-o" => {
                let Some(path) = args.next() else {
                    eprintln!("`--output` 需要提供输出路径");
                    std::process::exit(1);
                };
                output_override = Some(PathBuf::from(path));
            }
            "--demo" => demo = true,
            other if !other.starts_with('-') && input.is_none() => {
                input = Some(PathBuf::from(other));
            }
            other => {
                eprintln!("未知参数：{other}");
                std::process::exit(1);
            }
        }
    }

    let config = load_configuration(config_override);
    init_logging(&config);
    info!("启动 DXF 转图像工具");

    let document = if demo {
        info!("使用内置演示文档");
        build_demo_document()
    } else if let Some(path) = input {
        let loader = JsonFacade::new();
        match loader.load(&path) {
            Ok(document) => {
                info!(path = %path.display(), entity_count = document.entity_count(), "文档加载成功");
                document
            }
            Err(err) => {
                error!(path = %path.display(), error = %err, "文档加载失败");
                std::process::exit(1);
            }
        }
    } else {
        eprintln!("用法: dxsnap [--config <路径>] [--format jpeg|bmp] [--quality 0-100] [--output <路径>] (--demo | <document.json>)");
        std::process::exit(1);
    };

    let options = RenderOptions {
        width: config.canvas.width,
        height: config.canvas.height,
    };
    info!(
        width = options.width,
        height = options.height,
        "正在转换文档"
    );
    let pixmap = match render_document(&document, &options) {
        Ok(pixmap) => pixmap,
        Err(err) => {
            error!(error = %err, "转换失败");
            std::process::exit(1);
        }
    };

    let format = format_override.unwrap_or(config.output.format);
    let quality = quality_override.unwrap_or(config.output.jpeg_quality);
    let output = output_override
        .unwrap_or_else(|| PathBuf::from(format!("output.{}", format.extension())));

    let result = match format {
        OutputFormat::Jpeg => dxsnap_io::write_jpeg(
            &output,
            pixmap.data(),
            pixmap.width(),
            pixmap.height(),
            quality,
        ),
        OutputFormat::Bmp => {
            dxsnap_io::write_bmp(&output, pixmap.data(), pixmap.width(), pixmap.height())
        }
    };

    match result {
        Ok(()) => info!(path = %output.display(), "转换完成"),
        Err(err) => {
            error!(path = %output.display(), error = %err, "图像写出失败");
            std::process::exit(1);
        }
    }
}

fn load_configuration(override_path: Option<PathBuf>) -> AppConfig {
    match override_path {
        Some(path) => AppConfig::from_file(&path).unwrap_or_else(|err| {
            warn!(path = %path.display(), error = %err, "加载指定配置失败，使用默认配置");
            AppConfig::default()
        }),
        None => match AppConfig::discover() {
            Ok(cfg) => cfg,
            Err(err) => {
                match &err {
                    ConfigError::Io { path, .. } | ConfigError::Parse { path, .. } => {
                        warn!(path = %path.display(), error = %err, "加载默认配置失败，使用内建默认值");
                    }
                    ConfigError::Context { .. } => {
                        warn!(error = %err, "加载默认配置失败，使用内建默认值");
                    }
                }
                AppConfig::default()
            }
        },
    }
}

fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_new(config.logging.level.clone()).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(filter);
    if subscriber.try_init().is_err() {
        // 已初始化，忽略
    }
}

/// 覆盖全部图元种类的演示文档，便于快速验证渲染管线。
fn build_demo_document() -> Document {
    let mut doc = Document::new();

    doc.add_block_definition(BlockDefinition {
        name: "SEAT".to_string(),
        base_point: Point2::new(0.0, 0.0),
        entities: vec![Entity::Circle(Circle {
            center: Point2::new(0.0, 0.0),
            radius: 2.0,
            layer: "PART".to_string(),
        })],
    });

    doc.add_line(Point2::new(0.0, 0.0), Point2::new(120.0, 0.0), "0");
    doc.add_line(Point2::new(120.0, 0.0), Point2::new(120.0, 60.0), "0");
    doc.add_circle(Point2::new(30.0, 30.0), 12.0, "GEOM");
    doc.add_arc(Point2::new(70.0, 30.0), 10.0, 350.0, 10.0, "GEOM");
    doc.add_ellipse(
        Point2::new(95.0, 40.0),
        Vector2::new(12.0, 0.0),
        5.0,
        0.0,
        360.0,
        "GEOM",
    );
    doc.add_text(
        Point2::new(10.0, 52.0),
        "DXF 演示",
        4.0,
        0.0,
        Some("Arial".to_string()),
        "ANNOT",
    );
    doc.add_xline(Point2::new(60.0, 5.0), Vector2::new(1.0, 0.2), "AUX");
    doc.add_ray(Point2::new(60.0, 5.0), Vector2::new(-0.3, 1.0), "AUX");
    doc.add_leader(
        vec![
            Point2::new(42.0, 30.0),
            Point2::new(55.0, 45.0),
            Point2::new(65.0, 45.0),
        ],
        "ANNOT",
    );
    doc.add_mline(
        vec![
            Point2::new(5.0, 10.0),
            Point2::new(15.0, 20.0),
            Point2::new(25.0, 10.0),
        ],
        "GEOM",
    );
    doc.add_point(Point2::new(70.0, 50.0), "0");
    doc.add_solid(
        [
            Point3::new(100.0, 5.0, 0.0),
            Point3::new(112.0, 5.0, 0.0),
            Point3::new(112.0, 14.0, 0.0),
            Point3::new(100.0, 14.0, 0.0),
        ],
        "FILL",
    );
    doc.add_block_reference(
        "SEAT",
        Point2::new(50.0, 15.0),
        Vector2::new(1.5, 1.5),
        0.0,
        "0",
    );
    doc.add_block_reference_with_array(
        "SEAT",
        Point2::new(85.0, 15.0),
        Vector2::new(1.0, 1.0),
        45.0,
        3,
        2,
        6.0,
        6.0,
        "0",
    );
    doc
}
