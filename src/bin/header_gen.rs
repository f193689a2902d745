use clap::{App, Arg};
use oct_inl_ipsec_generator::*;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

fn main() {
    let matches = App::new("oct_inl_ipsec_header_gen")
        .author("shady83123 <shady831213@126.com>")
        .arg(
            Arg::with_name("path")
                .index(1)
                .required(true)
                .value_name("OUT_PATH")
                .validator(|path| {
                    if Path::new(path.as_str()).is_dir() {
                        Ok(())
                    } else {
                        Err(format!("{} is not dir!", path))
                    }
                })
                .help("header files output path"),
        )
        .arg(
            Arg::with_name("language")
                .short("l")
                .long("lang")
                .value_name("LANG")
                .require_delimiter(true)
                .takes_value(true)
                .validator(
                    |raw| match raw.split_whitespace().collect::<String>().as_str() {
                        "c" => Ok(()),
                        _ => Err(String::from("only support 'c'")),
                    },
                )
                .default_value("c")
                .help("header files language"),
        )
        .get_matches();
    let Some(path) = matches.value_of("path") else {
        return;
    };
    let path = PathBuf::from(path);
    let languages = matches.values_of("language").unwrap_or_default();
    for l in languages {
        for (what, r) in [("sa", gen_sa_desc(&path, l)), ("inst", gen_inst_desc(&path, l))] {
            if let Err(e) = r {
                eprintln!("Gen {} desc for '{}' to {} failed: {}", what, l, path.display(), e);
                std::process::exit(1);
            }
        }
    }
}

fn header_type(lang: &str) -> std::io::Result<HeaderType> {
    match lang {
        "c" => Ok(HeaderType::C),
        _ => Err(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            format!("language '{}'", lang),
        )),
    }
}

fn open_header(path: &Path, lang: &str, name: &str, guard: &str) -> std::io::Result<(PathBuf, fs::File)> {
    let out_path = path.join(lang);
    if !out_path.is_dir() {
        fs::create_dir_all(&out_path)?;
    }
    let out_file_path = out_path.join(name);
    let mut out_file = fs::File::create(&out_file_path)?;
    writeln!(out_file, "// This file is auto generated!")?;
    writeln!(out_file, "#ifndef {}", guard)?;
    writeln!(out_file, "#define {}", guard)?;
    writeln!(out_file, "#include <stdint.h>")?;
    Ok((out_file_path, out_file))
}

fn gen_sa_desc(path: &Path, lang: &str) -> std::io::Result<()> {
    use oct_inl_ipsec::desc::sa::*;
    let header_ty = header_type(lang)?;
    let (out_file_path, mut out_file) =
        open_header(path, lang, "oct_ipsec_sa.h", "__OCT_IPSEC_SA_H__")?;
    writeln!(out_file, "#define OCT_INB_SA_SLOT_SIZE {:#x}", INB_SA_SLOT_SIZE)?;
    SaDir::gen_header(&header_ty, &mut out_file)?;
    SaMode::gen_header(&header_ty, &mut out_file)?;
    SaProtocol::gen_header(&header_ty, &mut out_file)?;
    SaAesKeyLen::gen_header(&header_ty, &mut out_file)?;
    SaEncType::gen_header(&header_ty, &mut out_file)?;
    SaAuthType::gen_header(&header_ty, &mut out_file)?;
    SaEncapType::gen_header(&header_ty, &mut out_file)?;
    SaPktFmt::gen_header(&header_ty, &mut out_file)?;
    SaPktOutput::gen_header(&header_ty, &mut out_file)?;
    InbSaWord0::gen_header(&header_ty, &mut out_file)?;
    InbSaWord1::gen_header(&header_ty, &mut out_file)?;
    SaWord2::gen_header(&header_ty, &mut out_file)?;
    InbSaWord8::gen_header(&header_ty, &mut out_file)?;
    InbSaWord10::gen_header(&header_ty, &mut out_file)?;
    InbCtxUpdateReg::gen_header(&header_ty, &mut out_file)?;
    InboundSa::gen_header(&header_ty, &mut out_file)?;
    writeln!(out_file, "#endif")?;
    println!("Gen {} successfully!", out_file_path.display());
    Ok(())
}

fn gen_inst_desc(path: &Path, lang: &str) -> std::io::Result<()> {
    use oct_inl_ipsec::caps::CptEngCaps;
    use oct_inl_ipsec::desc::inst::*;
    let header_ty = header_type(lang)?;
    let (out_file_path, mut out_file) =
        open_header(path, lang, "oct_cpt_inst.h", "__OCT_CPT_INST_H__")?;
    writeln!(out_file, "#define OCT_CPT_INST_SIZE {:#x}", CPT_INST_SIZE)?;
    CptInst::gen_header(&header_ty, &mut out_file)?;
    InbParam1::gen_header(&header_ty, &mut out_file)?;
    CptEngCaps::gen_header(&header_ty, &mut out_file)?;
    writeln!(out_file, "#endif")?;
    println!("Gen {} successfully!", out_file_path.display());
    Ok(())
}
