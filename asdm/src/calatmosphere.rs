// Copyright 2017-2024 Peter Williams and collaborators
// Licensed under the MIT License.

/*!
The CalAtmosphere table: results of atmospheric calibration.

Each row holds, for one antenna, receiver band, and baseband, the spectra
measured and derived while calibrating the atmospheric contribution to the
system temperature. The spectra are indexed by receptor and frequency
channel, and `numReceptor`, `numFreq`, and `numLoad` record their declared
sizes.

*/

use ndarray::{Array2, Array3};

use crate::enums::{BasebandName, PolarizationType, ReceiverBand, SyscalMethod};
use crate::table::Table;
use crate::types::{ArrayTime, Frequency, Humidity, Length, Pressure, Tag, Temperature};

asdm_row! {
    /// A row of the CalAtmosphere table.
    pub struct CalAtmosphereRow {
        table = "CalAtmosphere";
        schema = "xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\" \
                  xmlns:clatm=\"http://Alma/XASDM/CalAtmosphereTable\" \
                  xsi:schemaLocation=\"http://Alma/XASDM/CalAtmosphereTable \
                  http://almaobservatory.org/XML/XASDM/3/CalAtmosphereTable.xsd\" \
                  schemaVersion=\"3\" schemaRevision=\"1.64\"";
        key {
            antenna_name: String => "antennaName", Scalar;
            receiver_band: ReceiverBand => "receiverBand", Enum;
            baseband_name: BasebandName => "basebandName", Enum;
            cal_data_id: Tag => "calDataId", Scalar;
            cal_reduction_id: Tag => "calReductionId", Scalar;
        }
        required {
            start_valid_time: ArrayTime => "startValidTime", Scalar;
            end_valid_time: ArrayTime => "endValidTime", Scalar;
            num_freq: i32 => "numFreq", Scalar;
            num_load: i32 => "numLoad", Scalar;
            num_receptor: i32 => "numReceptor", Scalar;
            forward_eff_spectrum: Array2<f32> => "forwardEffSpectrum", Sequence;
            /// The lower and upper edges of the frequency range.
            frequency_range: Vec<Frequency> => "frequencyRange", Sequence;
            ground_pressure: Pressure => "groundPressure", Quantity;
            ground_rel_humidity: Humidity => "groundRelHumidity", Quantity;
            frequency_spectrum: Vec<Frequency> => "frequencySpectrum", Sequence;
            ground_temperature: Temperature => "groundTemperature", Quantity;
            polarization_types: Vec<PolarizationType> => "polarizationTypes", Sequence;
            power_sky_spectrum: Array2<f32> => "powerSkySpectrum", Sequence;
            /// Indexed by load, receptor, and channel.
            power_load_spectrum: Array3<f32> => "powerLoadSpectrum", Sequence;
            syscal_type: SyscalMethod => "syscalType", Enum;
            t_atm_spectrum: Array2<Temperature> => "tAtmSpectrum", Sequence;
            t_rec_spectrum: Array2<Temperature> => "tRecSpectrum", Sequence;
            t_sys_spectrum: Array2<Temperature> => "tSysSpectrum", Sequence;
            tau_spectrum: Array2<f32> => "tauSpectrum", Sequence;
            t_atm: Vec<Temperature> => "tAtm", Sequence;
            t_rec: Vec<Temperature> => "tRec", Sequence;
            t_sys: Vec<Temperature> => "tSys", Sequence;
            tau: Vec<f32> => "tau", Sequence;
            water: Vec<Length> => "water", Sequence;
            water_error: Vec<Length> => "waterError", Sequence;
        }
        optional {
            alpha_spectrum: Array2<f32> => "alphaSpectrum", Sequence;
            forward_efficiency: Vec<f32> => "forwardEfficiency", Sequence;
            forward_efficiency_error: Vec<f64> => "forwardEfficiencyError", Sequence;
            sb_gain: Vec<f32> => "sbGain", Sequence;
            sb_gain_error: Vec<f32> => "sbGainError", Sequence;
            sb_gain_spectrum: Array2<f32> => "sbGainSpectrum", Sequence;
        }
        dimension_warnings = check_dimensions;
    }
}

/// The CalAtmosphere table.
pub type CalAtmosphereTable = Table<CalAtmosphereRow>;

impl CalAtmosphereRow {
    /// Create a row with the given key and default values for everything
    /// else.
    pub fn with_key<S: Into<String>>(
        antenna_name: S,
        receiver_band: ReceiverBand,
        baseband_name: BasebandName,
        cal_data_id: Tag,
        cal_reduction_id: Tag,
    ) -> Self {
        CalAtmosphereRow {
            antenna_name: antenna_name.into(),
            receiver_band,
            baseband_name,
            cal_data_id,
            cal_reduction_id,
            ..Default::default()
        }
    }
}

// Empty arrays agree with any dimensions that imply no elements.
fn expect_shape(problems: &mut Vec<String>, name: &str, actual: &[usize], expected: &[usize]) {
    let n_actual: usize = actual.iter().product();
    let n_expected: usize = expected.iter().product();

    if actual != expected && (n_actual != 0 || n_expected != 0) {
        problems.push(format!(
            "{} has shape {:?}, but the row's dimensions imply {:?}",
            name, actual, expected
        ));
    }
}

fn check_dimensions(row: &CalAtmosphereRow) -> Vec<String> {
    let mut problems = Vec::new();

    for (name, value) in [
        ("numFreq", row.num_freq),
        ("numLoad", row.num_load),
        ("numReceptor", row.num_receptor),
    ] {
        if value < 0 {
            problems.push(format!("{} is negative ({})", name, value));
        }
    }

    if !problems.is_empty() {
        return problems;
    }

    let nf = row.num_freq as usize;
    let nl = row.num_load as usize;
    let nr = row.num_receptor as usize;
    let p = &mut problems;

    for (name, shape) in [
        ("forwardEffSpectrum", row.forward_eff_spectrum.shape()),
        ("powerSkySpectrum", row.power_sky_spectrum.shape()),
        ("tAtmSpectrum", row.t_atm_spectrum.shape()),
        ("tRecSpectrum", row.t_rec_spectrum.shape()),
        ("tSysSpectrum", row.t_sys_spectrum.shape()),
        ("tauSpectrum", row.tau_spectrum.shape()),
    ] {
        expect_shape(p, name, shape, &[nr, nf]);
    }

    expect_shape(p, "powerLoadSpectrum", row.power_load_spectrum.shape(), &[nl, nr, nf]);
    expect_shape(p, "frequencySpectrum", &[row.frequency_spectrum.len()], &[nf]);

    for (name, len) in [
        ("polarizationTypes", row.polarization_types.len()),
        ("tAtm", row.t_atm.len()),
        ("tRec", row.t_rec.len()),
        ("tSys", row.t_sys.len()),
        ("tau", row.tau.len()),
        ("water", row.water.len()),
        ("waterError", row.water_error.len()),
    ] {
        expect_shape(p, name, &[len], &[nr]);
    }

    if let Some(a) = &row.alpha_spectrum {
        expect_shape(p, "alphaSpectrum", a.shape(), &[nr, nf]);
    }

    if let Some(a) = &row.sb_gain_spectrum {
        expect_shape(p, "sbGainSpectrum", a.shape(), &[nr, nf]);
    }

    for (name, len) in [
        ("forwardEfficiency", row.forward_efficiency.as_ref().map(|v| v.len())),
        ("forwardEfficiencyError", row.forward_efficiency_error.as_ref().map(|v| v.len())),
        ("sbGain", row.sb_gain.as_ref().map(|v| v.len())),
        ("sbGainError", row.sb_gain_error.as_ref().map(|v| v.len())),
    ] {
        if let Some(len) = len {
            expect_shape(p, name, &[len], &[nr]);
        }
    }

    problems
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::Container;
    use crate::errors::AsdmError;
    use crate::row::AsdmRow;
    use crate::types::TagType;
    use rubbl_core::io::ByteOrder;
    use rubbl_core::notify::{BufferingNotificationBackend, NoopNotificationBackend, NotificationKind};
    use std::rc::Rc;

    fn key_row(antenna: &str) -> CalAtmosphereRow {
        CalAtmosphereRow::with_key(
            antenna,
            ReceiverBand::ALMA_RB_03,
            BasebandName::BB_1,
            Tag::new(0, TagType::CalData),
            Tag::new(0, TagType::CalReduction),
        )
    }

    fn key(antenna: &str) -> <CalAtmosphereRow as AsdmRow>::Key {
        key_row(antenna).key()
    }

    /// A row with two receptors, three channels, and two loads.
    fn full_row(antenna: &str) -> CalAtmosphereRow {
        let (nr, nf, nl) = (2, 3, 2);
        let temps = |base: f64| Array2::from_shape_fn((nr, nf), |(i, j)| Temperature::new(base + (i * nf + j) as f64));

        CalAtmosphereRow {
            start_valid_time: ArrayTime::new(4_815_162_342_000_000_000),
            end_valid_time: ArrayTime::new(4_815_162_343_000_000_000),
            num_freq: nf as i32,
            num_load: nl as i32,
            num_receptor: nr as i32,
            forward_eff_spectrum: Array2::from_elem((nr, nf), 0.95),
            frequency_range: vec![Frequency::new(84.0e9), Frequency::new(116.0e9)],
            ground_pressure: Pressure::new(55_000.0),
            ground_rel_humidity: Humidity::new(12.5),
            frequency_spectrum: vec![Frequency::new(90.0e9), Frequency::new(100.0e9), Frequency::new(110.0e9)],
            ground_temperature: Temperature::new(270.25),
            polarization_types: vec![PolarizationType::X, PolarizationType::Y],
            power_sky_spectrum: Array2::from_shape_fn((nr, nf), |(i, j)| (i + j) as f32 * 0.5),
            power_load_spectrum: Array3::from_shape_fn((nl, nr, nf), |(i, j, k)| (i * 100 + j * 10 + k) as f32),
            syscal_type: SyscalMethod::SKYDIP,
            t_atm_spectrum: temps(260.0),
            t_rec_spectrum: temps(40.0),
            t_sys_spectrum: temps(90.0),
            tau_spectrum: Array2::from_elem((nr, nf), 0.0625),
            t_atm: vec![Temperature::new(261.0), Temperature::new(262.0)],
            t_rec: vec![Temperature::new(41.0), Temperature::new(42.0)],
            t_sys: vec![Temperature::new(91.0), Temperature::new(92.0)],
            tau: vec![0.0625, 0.125],
            water: vec![Length::new(0.001), Length::new(0.0011)],
            water_error: vec![Length::new(0.0001), Length::new(0.0001)],
            sb_gain: Some(vec![0.5, 0.25]),
            ..key_row(antenna)
        }
    }

    fn table() -> CalAtmosphereTable {
        Table::new(Rc::new(Container::default()))
    }

    #[test]
    fn attribute_order() {
        let t = table();
        assert_eq!(
            t.key_names(),
            vec!["antennaName", "receiverBand", "basebandName", "calDataId", "calReductionId"]
        );

        let names = t.attribute_names();
        assert_eq!(names.len(), 36);
        assert_eq!(names[5], "startValidTime");
        assert_eq!(names[29], "waterError");
        assert_eq!(names[30], "alphaSpectrum");
        assert_eq!(names[35], "sbGainSpectrum");
    }

    #[test]
    fn scenario_xml() {
        let mut t = table();
        let mut row = key_row("DV01");
        row.num_freq = 4;
        row.frequency_spectrum = vec![Frequency::default(); 4];
        t.add(row).unwrap();

        let xml = t.to_xml().unwrap();
        assert!(xml.contains("<CalAtmosphereTable xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\""));
        assert!(xml.contains("schemaVersion=\"3\" schemaRevision=\"1.64\">"));
        assert!(xml.contains("<receiverBand> ALMA_RB_03 </receiverBand>"));
        assert!(xml.contains("<calDataId> CalData_0 </calDataId>"));
        assert!(xml.contains("entityTypeName='CalAtmosphereTable'"));
        assert!(xml.ends_with("</CalAtmosphereTable>\n"));

        let mut t2 = table();
        let mut nb = BufferingNotificationBackend::new();
        t2.from_xml(&xml, &mut nb).unwrap();
        assert_eq!(t2.get_row_by_key(&key("DV01")).unwrap().num_freq, 4);
        assert_eq!(t2.version(), Some("3"));
        assert!(nb.is_empty());
    }

    #[test]
    fn scenario_mime() {
        let mut t = table();
        let mut row = key_row("DV01");
        row.num_freq = 4;
        row.frequency_spectrum = vec![Frequency::default(); 4];
        t.add(row).unwrap();

        for &order in &[ByteOrder::BigEndian, ByteOrder::LittleEndian] {
            let msg = t.to_mime(order).unwrap();
            let mut t2 = table();
            t2.set_from_mime(&msg, &mut NoopNotificationBackend::new())
                .unwrap();
            assert_eq!(t2.get_row_by_key(&key("DV01")).unwrap().num_freq, 4);
            assert_eq!(t2.rows(), t.rows());
        }
    }

    #[test]
    fn full_rows_survive_both_forms() {
        let mut t = table();
        t.add(full_row("DV01")).unwrap();
        let mut other = full_row("DV02");
        other.alpha_spectrum = Some(Array2::from_elem((2, 3), 1.5));
        other.forward_efficiency_error = Some(vec![0.01, 0.02]);
        t.add(other).unwrap();

        let mut nb = BufferingNotificationBackend::new();
        let mut t2 = table();
        t2.from_xml(&t.to_xml().unwrap(), &mut nb).unwrap();
        assert_eq!(t2.rows(), t.rows());

        for &order in &[ByteOrder::BigEndian, ByteOrder::LittleEndian] {
            let msg = t.to_mime(order).unwrap();
            let mut t3 = table();
            t3.set_from_mime(&msg, &mut nb).unwrap();
            assert_eq!(t3.rows(), t.rows());
        }

        assert_eq!(nb.count_kind(NotificationKind::Warning), 0);

        let header = t.mime_xml_part(ByteOrder::LittleEndian);
        assert!(header.contains("<alphaSpectrum/>\n<forwardEfficiencyError/>\n<sbGain/>\n</Attributes>"));
        assert!(!header.contains("<sbGainSpectrum/>"));
    }

    #[test]
    fn lookup_versus_key() {
        let mut t = table();
        t.add(full_row("DV01")).unwrap();

        let mut same_key = full_row("DV01");
        same_key.num_load = 7;
        assert!(matches!(t.add(same_key.clone()), Err(AsdmError::DuplicateKey { .. })));
        assert!(t.lookup(&same_key).is_none());
        assert!(t.lookup(&full_row("DV01")).is_some());
        assert!(t.get_row_by_key(&same_key.key()).is_some());
    }

    #[test]
    fn required_value_comparison() {
        let a = full_row("DV01");
        let b = full_row("DV02");
        assert!(a.equal_by_required_value(&b));

        let mut c = full_row("DV01");
        c.syscal_type = SyscalMethod::TEMPERATURE_SCALE;
        assert!(!a.equal_by_required_value(&c));

        assert!(a.compare_required_value(
            &b.start_valid_time,
            &b.end_valid_time,
            &3,
            &2,
            &2,
            &b.forward_eff_spectrum,
            &b.frequency_range,
            &b.ground_pressure,
            &b.ground_rel_humidity,
            &b.frequency_spectrum,
            &b.ground_temperature,
            &b.polarization_types,
            &b.power_sky_spectrum,
            &b.power_load_spectrum,
            &SyscalMethod::SKYDIP,
            &b.t_atm_spectrum,
            &b.t_rec_spectrum,
            &b.t_sys_spectrum,
            &b.tau_spectrum,
            &b.t_atm,
            &b.t_rec,
            &b.t_sys,
            &b.tau,
            &b.water,
            &b.water_error,
        ));
    }

    #[test]
    fn dimension_checks() {
        assert!(check_dimensions(&full_row("DV01")).is_empty());
        assert!(check_dimensions(&CalAtmosphereRow::default()).is_empty());

        let mut row = full_row("DV01");
        row.num_freq = 4;
        let problems = check_dimensions(&row);
        assert_eq!(problems.len(), 8);
        assert!(problems[0].starts_with("forwardEffSpectrum has shape [2, 3]"));

        let mut row = full_row("DV01");
        row.sb_gain = Some(vec![1.0]);
        assert_eq!(check_dimensions(&row).len(), 1);

        let mut row = full_row("DV01");
        row.num_receptor = -1;
        assert_eq!(check_dimensions(&row), vec!["numReceptor is negative (-1)".to_owned()]);
    }

    #[test]
    fn inconsistent_rows_load_with_warnings() {
        let mut t = table();
        let mut row = full_row("DV01");
        row.num_freq = 4;
        t.add(row).unwrap();

        let mut t2 = table();
        let mut nb = BufferingNotificationBackend::new();
        t2.set_from_mime(&t.to_mime(ByteOrder::LittleEndian).unwrap(), &mut nb)
            .unwrap();
        assert_eq!(t2.size(), 1);
        assert_eq!(nb.count_kind(NotificationKind::Warning), 8);
    }

    #[test]
    fn files_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut t = table();
        t.add(full_row("DV01")).unwrap();
        t.add(full_row("PM03")).unwrap();
        t.set_file_as_bin(true);
        t.to_file(dir.path()).unwrap();

        assert!(dir.path().join("CalAtmosphere.bin").exists());

        let mut t2 = table();
        t2.set_declared_size(Some(2));
        t2.set_from_file(dir.path(), &mut NoopNotificationBackend::new())
            .unwrap();
        assert_eq!(t2.rows(), t.rows());
    }
}
