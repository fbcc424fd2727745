//! The public booking wizard: service and barber, then date and time, then
//! contact details.
//!
//! The wizard is rebuilt on every request from the hidden fields of the form
//! ([`WizardForm`]), moved along by exactly one [`WizardAction`], and written
//! back into the next page.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Days, FixedOffset, NaiveDate, SecondsFormat, TimeZone, Utc};
use serde::Deserialize;

use crate::{
    api::NewAppointment,
    models::{Profile, Service, SlotTime},
};

pub const STEP_LABELS: [&str; 3] = ["Escolha", "Horário", "Seus Dados"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactDraft {
    pub client_name: String,
    pub client_phone: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Wizard {
    Choose {
        service: Option<Service>,
        barber: Option<Profile>,
        date: Option<NaiveDate>,
        time: Option<SlotTime>,
        contact: ContactDraft,
    },
    Schedule {
        service: Service,
        barber: Profile,
        date: Option<NaiveDate>,
        time: Option<SlotTime>,
        contact: ContactDraft,
    },
    Contact {
        service: Service,
        barber: Profile,
        date: NaiveDate,
        time: SlotTime,
        contact: ContactDraft,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardAction {
    SelectService(i64),
    SelectBarber(i64),
    SelectDate(NaiveDate),
    SelectTime(SlotTime),
    Next,
    Back,
    Submit,
}

impl FromStr for WizardAction {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (kind, arg) = value.split_once(':').unwrap_or((value, ""));
        let bad = || format!("invalid wizard action {value:?}");
        match kind {
            "service" => arg.parse().map(WizardAction::SelectService).map_err(|_| bad()),
            "barber" => arg.parse().map(WizardAction::SelectBarber).map_err(|_| bad()),
            "date" => NaiveDate::parse_from_str(arg, "%Y-%m-%d")
                .map(WizardAction::SelectDate)
                .map_err(|_| bad()),
            "time" => arg.parse().map(WizardAction::SelectTime).map_err(|_| bad()),
            "next" => Ok(WizardAction::Next),
            "back" => Ok(WizardAction::Back),
            "submit" => Ok(WizardAction::Submit),
            _ => Err(bad()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardError {
    NeedServiceAndBarber,
    NeedDateAndTime,
    PastDate,
    BeyondHorizon(u32),
    OutOfStep,
}

impl fmt::Display for WizardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WizardError::NeedServiceAndBarber => {
                f.write_str("Escolha um serviço e um barbeiro para avançar.")
            }
            WizardError::NeedDateAndTime => f.write_str("Escolha uma data e um horário para avançar."),
            WizardError::PastDate => f.write_str("Escolha uma data a partir de hoje."),
            WizardError::BeyondHorizon(days) => {
                write!(f, "Escolha uma data dentro dos próximos {days} dias.")
            }
            WizardError::OutOfStep => f.write_str("Esta ação não está disponível neste passo."),
        }
    }
}

/// The days a client may book: today through `days` days ahead, shop time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookingWindow {
    pub first: NaiveDate,
    pub last: NaiveDate,
    days: u32,
}

impl BookingWindow {
    pub fn new(today: NaiveDate, days: u32) -> Self {
        let last = today
            .checked_add_days(Days::new(u64::from(days)))
            .unwrap_or(NaiveDate::MAX);
        Self {
            first: today,
            last,
            days,
        }
    }

    pub fn check(&self, date: NaiveDate) -> Result<(), WizardError> {
        if date < self.first {
            Err(WizardError::PastDate)
        } else if date > self.last {
            Err(WizardError::BeyondHorizon(self.days))
        } else {
            Ok(())
        }
    }
}

/// Raw hidden fields posted by every wizard page.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WizardForm {
    #[serde(default)]
    pub step: u8,
    #[serde(default)]
    pub service_id: String,
    #[serde(default)]
    pub barber_id: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub client_name: String,
    #[serde(default)]
    pub client_phone: String,
    /// Value of the date input, used when `action` is a bare `date`.
    #[serde(default)]
    pub pick_date: String,
    #[serde(default)]
    pub action: String,
}

impl WizardForm {
    /// The posted action, with the date input folded into a bare `date`.
    pub fn action(&self) -> Result<WizardAction, String> {
        match self.action.trim() {
            "date" => format!("date:{}", self.pick_date.trim()).parse(),
            other => other.parse(),
        }
    }

    /// Why the posted date cannot be booked, if it parses but falls outside
    /// the window.
    pub fn date_error(&self, window: &BookingWindow) -> Option<WizardError> {
        let date = NaiveDate::parse_from_str(self.date.trim(), "%Y-%m-%d").ok()?;
        window.check(date).err()
    }
}

impl Wizard {
    pub fn start(service: Option<Service>) -> Self {
        Wizard::Choose {
            service,
            barber: None,
            date: None,
            time: None,
            contact: ContactDraft::default(),
        }
    }

    /// Rebuilds the wizard from posted fields, resolving ids against the
    /// current catalogue. Dates outside `window` are dropped. A step whose
    /// requirements no longer hold falls back to the closest earlier step.
    pub fn from_form(
        form: &WizardForm,
        services: &[Service],
        barbers: &[Profile],
        window: &BookingWindow,
    ) -> Self {
        let service = parse_id(&form.service_id)
            .and_then(|id| services.iter().find(|service| service.id == id).cloned());
        let barber = parse_id(&form.barber_id)
            .and_then(|id| barbers.iter().find(|barber| barber.id == id).cloned());
        let date = NaiveDate::parse_from_str(form.date.trim(), "%Y-%m-%d")
            .ok()
            .filter(|date| window.check(*date).is_ok());
        let time = form.time.parse::<SlotTime>().ok();
        let contact = ContactDraft {
            client_name: form.client_name.clone(),
            client_phone: form.client_phone.clone(),
        };

        let choose = Wizard::Choose {
            service,
            barber,
            date,
            time,
            contact,
        };
        match form.step {
            2 => choose.advance().unwrap_or_else(|(wizard, _)| wizard),
            3 => match choose.advance() {
                Ok(schedule) => schedule.advance().unwrap_or_else(|(wizard, _)| wizard),
                Err((wizard, _)) => wizard,
            },
            _ => choose,
        }
    }

    pub fn step(&self) -> u8 {
        match self {
            Wizard::Choose { .. } => 1,
            Wizard::Schedule { .. } => 2,
            Wizard::Contact { .. } => 3,
        }
    }

    pub fn service(&self) -> Option<&Service> {
        match self {
            Wizard::Choose { service, .. } => service.as_ref(),
            Wizard::Schedule { service, .. } | Wizard::Contact { service, .. } => Some(service),
        }
    }

    pub fn barber(&self) -> Option<&Profile> {
        match self {
            Wizard::Choose { barber, .. } => barber.as_ref(),
            Wizard::Schedule { barber, .. } | Wizard::Contact { barber, .. } => Some(barber),
        }
    }

    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            Wizard::Choose { date, .. } | Wizard::Schedule { date, .. } => *date,
            Wizard::Contact { date, .. } => Some(*date),
        }
    }

    pub fn time(&self) -> Option<SlotTime> {
        match self {
            Wizard::Choose { time, .. } | Wizard::Schedule { time, .. } => *time,
            Wizard::Contact { time, .. } => Some(*time),
        }
    }

    pub fn contact(&self) -> &ContactDraft {
        match self {
            Wizard::Choose { contact, .. }
            | Wizard::Schedule { contact, .. }
            | Wizard::Contact { contact, .. } => contact,
        }
    }

    /// The (barber, date) pair availability must be fetched for, if any.
    pub fn availability_key(&self) -> Option<(i64, NaiveDate)> {
        match self {
            Wizard::Schedule {
                barber,
                date: Some(date),
                ..
            } => Some((barber.id, *date)),
            _ => None,
        }
    }

    /// Applies one action. On refusal the unchanged wizard comes back with
    /// the reason. `Submit` is not handled here; see [`Wizard::submission`].
    pub fn apply(
        self,
        action: WizardAction,
        services: &[Service],
        barbers: &[Profile],
        window: &BookingWindow,
    ) -> Result<Self, (Self, WizardError)> {
        match action {
            WizardAction::SelectService(id) => match self {
                Wizard::Choose {
                    service,
                    barber,
                    date,
                    time,
                    contact,
                } => {
                    let picked = services.iter().find(|candidate| candidate.id == id).cloned();
                    let changed = picked.as_ref().map(|s| s.id) != service.as_ref().map(|s| s.id);
                    if picked.is_none() || !changed {
                        return Ok(Wizard::Choose {
                            service: picked.or(service),
                            barber,
                            date,
                            time,
                            contact,
                        });
                    }
                    Ok(Wizard::Choose {
                        service: picked,
                        barber: None,
                        date: None,
                        time: None,
                        contact,
                    })
                }
                other => Err((other, WizardError::OutOfStep)),
            },
            WizardAction::SelectBarber(id) => match self {
                Wizard::Choose {
                    service,
                    barber,
                    date,
                    time,
                    contact,
                } => match barbers.iter().find(|candidate| candidate.id == id).cloned() {
                    Some(picked) => Ok(Wizard::Choose {
                        service,
                        barber: Some(picked),
                        date: None,
                        time: None,
                        contact,
                    }),
                    None => Ok(Wizard::Choose {
                        service,
                        barber,
                        date,
                        time,
                        contact,
                    }),
                },
                other => Err((other, WizardError::OutOfStep)),
            },
            WizardAction::SelectDate(picked) => match self {
                Wizard::Schedule {
                    service,
                    barber,
                    date,
                    time,
                    contact,
                } => {
                    if let Err(err) = window.check(picked) {
                        return Err((
                            Wizard::Schedule {
                                service,
                                barber,
                                date,
                                time,
                                contact,
                            },
                            err,
                        ));
                    }
                    Ok(Wizard::Schedule {
                        service,
                        barber,
                        date: Some(picked),
                        time: None,
                        contact,
                    })
                }
                other => Err((other, WizardError::OutOfStep)),
            },
            WizardAction::SelectTime(picked) => match self {
                Wizard::Schedule {
                    service,
                    barber,
                    date: Some(date),
                    contact,
                    ..
                } => Ok(Wizard::Schedule {
                    service,
                    barber,
                    date: Some(date),
                    time: Some(picked),
                    contact,
                }),
                other => Err((other, WizardError::OutOfStep)),
            },
            WizardAction::Next => self.advance(),
            WizardAction::Back => Ok(self.retreat()),
            WizardAction::Submit => Err((self, WizardError::OutOfStep)),
        }
    }

    fn advance(self) -> Result<Self, (Self, WizardError)> {
        match self {
            Wizard::Choose {
                service: Some(service),
                barber: Some(barber),
                date,
                time,
                contact,
            } => Ok(Wizard::Schedule {
                service,
                barber,
                date,
                time: date.and(time),
                contact,
            }),
            choose @ Wizard::Choose { .. } => Err((choose, WizardError::NeedServiceAndBarber)),
            Wizard::Schedule {
                service,
                barber,
                date: Some(date),
                time: Some(time),
                contact,
            } => Ok(Wizard::Contact {
                service,
                barber,
                date,
                time,
                contact,
            }),
            schedule @ Wizard::Schedule { .. } => Err((schedule, WizardError::NeedDateAndTime)),
            contact @ Wizard::Contact { .. } => Ok(contact),
        }
    }

    fn retreat(self) -> Self {
        match self {
            Wizard::Contact {
                service,
                barber,
                date,
                time,
                contact,
            } => Wizard::Schedule {
                service,
                barber,
                date: Some(date),
                time: Some(time),
                contact,
            },
            Wizard::Schedule {
                service,
                barber,
                date,
                time,
                contact,
            } => Wizard::Choose {
                service: Some(service),
                barber: Some(barber),
                date,
                time,
                contact,
            },
            choose => choose,
        }
    }

    /// Drops a chosen time that the latest availability no longer offers.
    pub fn keep_time_if_offered(self, offered: &[SlotTime]) -> Self {
        match self {
            Wizard::Schedule {
                service,
                barber,
                date,
                time: Some(time),
                contact,
            } if !offered.contains(&time) => Wizard::Schedule {
                service,
                barber,
                date,
                time: None,
                contact,
            },
            other => other,
        }
    }

    pub fn with_contact(self, client_name: &str, client_phone: &str) -> Self {
        let contact = ContactDraft {
            client_name: client_name.to_string(),
            client_phone: client_phone.to_string(),
        };
        match self {
            Wizard::Contact {
                service,
                barber,
                date,
                time,
                ..
            } => Wizard::Contact {
                service,
                barber,
                date,
                time,
                contact,
            },
            other => other,
        }
    }

    /// The request body for the final step. Earlier steps and dates outside
    /// `window` are refused with the reason.
    pub fn submission(
        &self,
        offset: FixedOffset,
        window: &BookingWindow,
    ) -> Result<NewAppointment, WizardError> {
        match self {
            Wizard::Contact {
                service,
                barber,
                date,
                time,
                contact,
            } => {
                window.check(*date)?;
                Ok(NewAppointment {
                    service_id: service.id,
                    barber_id: barber.id,
                    client_name: contact.client_name.trim().to_string(),
                    client_phone: contact.client_phone.trim().to_string(),
                    appointment_time: appointment_timestamp(*date, *time, offset),
                })
            }
            Wizard::Schedule { .. } => Err(WizardError::NeedDateAndTime),
            Wizard::Choose { .. } => Err(WizardError::NeedServiceAndBarber),
        }
    }
}

/// `date` at `time` on the shop's clock, as an ISO-8601 UTC instant with
/// zeroed seconds and milliseconds.
pub fn appointment_instant(date: NaiveDate, time: SlotTime, offset: FixedOffset) -> DateTime<Utc> {
    let naive = date
        .and_hms_opt(time.hour, time.minute, 0)
        .unwrap_or_else(|| date.and_time(chrono::NaiveTime::MIN));
    match offset.from_local_datetime(&naive).single() {
        Some(local) => local.with_timezone(&Utc),
        None => Utc.from_utc_datetime(&naive),
    }
}

pub fn appointment_timestamp(date: NaiveDate, time: SlotTime, offset: FixedOffset) -> String {
    appointment_instant(date, time, offset).to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_id(raw: &str) -> Option<i64> {
    raw.trim().parse().ok()
}
