//! Wortfilter – Maskiert unerwuenschte Woerter in Chat-Texten
//!
//! Pure Funktion ohne Zustand und Seiteneffekte. Gematcht wird
//! case-insensitiv auf ganze Woerter; jedes getroffene Wort wird durch
//! eine gleich lange Folge des Maskenzeichens ersetzt. Laenge,
//! Wortanzahl, Satzzeichen und Leerraum des Textes bleiben exakt
//! erhalten. Da das Maskenzeichen selbst kein Wortzeichen ist, ist der
//! Filter idempotent.

use std::collections::HashSet;

/// Zeichen mit dem getroffene Woerter maskiert werden
pub const MASKEN_ZEICHEN: char = '*';

/// Case-insensitiver Ganzwort-Filter gegen eine konfigurierbare Wortliste
#[derive(Debug, Clone, Default)]
pub struct WortFilter {
    /// Unerwuenschte Woerter, kleingeschrieben
    woerter: HashSet<String>,
}

impl WortFilter {
    /// Erstellt einen Filter aus der gegebenen Wortliste
    ///
    /// Die Eintraege werden kleingeschrieben abgelegt; Duplikate
    /// kollabieren.
    pub fn neu<I, S>(wortliste: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            woerter: wortliste
                .into_iter()
                .map(|w| w.as_ref().to_lowercase())
                .collect(),
        }
    }

    /// Gibt die Anzahl der gefilterten Woerter zurueck
    pub fn wort_anzahl(&self) -> usize {
        self.woerter.len()
    }

    /// Filtert einen Text und gibt die maskierte Kopie zurueck
    ///
    /// Ein Wort ist ein maximaler Lauf alphanumerischer Zeichen; alles
    /// andere ist Trenner und wird unveraendert uebernommen.
    pub fn filtern(&self, text: &str) -> String {
        if self.woerter.is_empty() {
            return text.to_string();
        }

        let mut ergebnis = String::with_capacity(text.len());
        let mut wort = String::new();

        for zeichen in text.chars() {
            if zeichen.is_alphanumeric() {
                wort.push(zeichen);
            } else {
                self.wort_ausgeben(&mut ergebnis, &mut wort);
                ergebnis.push(zeichen);
            }
        }
        self.wort_ausgeben(&mut ergebnis, &mut wort);

        ergebnis
    }

    /// Haengt das gesammelte Wort maskiert oder unveraendert an
    fn wort_ausgeben(&self, ergebnis: &mut String, wort: &mut String) {
        if wort.is_empty() {
            return;
        }
        if self.woerter.contains(&wort.to_lowercase()) {
            ergebnis.extend(std::iter::repeat(MASKEN_ZEICHEN).take(wort.chars().count()));
        } else {
            ergebnis.push_str(wort);
        }
        wort.clear();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn test_filter() -> WortFilter {
        WortFilter::neu(["badword", "schimpf"])
    }

    #[test]
    fn maskiert_ganze_woerter() {
        let f = test_filter();
        assert_eq!(f.filtern("ein badword hier"), "ein ******* hier");
    }

    #[test]
    fn case_insensitiv() {
        let f = test_filter();
        assert_eq!(f.filtern("BadWord BADWORD badword"), "******* ******* *******");
    }

    #[test]
    fn teilwoerter_bleiben_unberuehrt() {
        // Ganzwort-Matching: "badwords" ist ein anderes Wort
        let f = test_filter();
        assert_eq!(f.filtern("badwords"), "badwords");
        assert_eq!(f.filtern("einbadword"), "einbadword");
    }

    #[test]
    fn satzzeichen_als_wortgrenze() {
        let f = test_filter();
        assert_eq!(f.filtern("badword!"), "*******!");
        assert_eq!(f.filtern("(badword)"), "(*******)");
        assert_eq!(f.filtern("badword,schimpf."), "*******,*******.");
    }

    #[test]
    fn laenge_bleibt_erhalten() {
        let f = test_filter();
        for text in [
            "badword",
            "ein badword, ein schimpf!",
            "gar nichts boeses",
            "",
            "  badword  ",
        ] {
            assert_eq!(
                f.filtern(text).chars().count(),
                text.chars().count(),
                "Laenge veraendert fuer: {:?}",
                text
            );
        }
    }

    #[test]
    fn idempotent() {
        let f = test_filter();
        for text in ["badword", "ein badword hier", "*** schon maskiert", "ok"] {
            let einmal = f.filtern(text);
            let zweimal = f.filtern(&einmal);
            assert_eq!(einmal, zweimal, "Nicht idempotent fuer: {:?}", text);
        }
    }

    #[test]
    fn leere_wortliste_gibt_text_unveraendert_zurueck() {
        let f = WortFilter::neu(Vec::<String>::new());
        assert_eq!(f.filtern("badword"), "badword");
    }

    #[test]
    fn leerraum_bleibt_verbatim() {
        let f = test_filter();
        assert_eq!(f.filtern("a  badword\t b"), "a  *******\t b");
    }
}
