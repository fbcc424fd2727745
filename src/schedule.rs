//! Slot blocking and absence ranges for a barber's own schedule.

use std::future::Future;

use chrono::NaiveDate;

use crate::{
    api::{ApiError, ScheduleApi},
    models::{Slot, SlotStatus},
};

pub const BLOCKED_MESSAGE: &str = "Horário bloqueado!";
pub const UNBLOCKED_MESSAGE: &str = "Horário desbloqueado!";
pub const TOGGLE_FAILED_MESSAGE: &str = "Ocorreu um erro.";
pub const MISSING_START_MESSAGE: &str = "Por favor, selecione um período de início e fim.";
pub const REVERSED_RANGE_MESSAGE: &str = "A data de fim não pode ser anterior à data de início.";

/// Applies `change` to `state` before `request` resolves and puts the
/// snapshot back if the request fails.
pub async fn optimistic<S, T, E, Fut>(
    state: &mut S,
    change: impl FnOnce(&mut S),
    request: Fut,
) -> Result<T, E>
where
    S: Clone,
    Fut: Future<Output = Result<T, E>>,
{
    let snapshot = state.clone();
    change(state);
    match request.await {
        Ok(value) => Ok(value),
        Err(err) => {
            *state = snapshot;
            Err(err)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    Block,
    Unblock,
}

impl Toggle {
    /// `None` for slots that cannot be toggled.
    pub fn for_status(status: SlotStatus) -> Option<Self> {
        match status {
            SlotStatus::Available => Some(Toggle::Block),
            SlotStatus::Blocked => Some(Toggle::Unblock),
            SlotStatus::Booked | SlotStatus::Processing => None,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Toggle::Block => BLOCKED_MESSAGE,
            Toggle::Unblock => UNBLOCKED_MESSAGE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    Toggled(Toggle),
    Ignored,
}

/// One day of a barber's slots as last seen from the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayBoard {
    pub date: NaiveDate,
    pub slots: Vec<Slot>,
}

impl DayBoard {
    pub async fn load<A: ScheduleApi + ?Sized>(api: &A, date: NaiveDate) -> Result<Self, ApiError> {
        let slots = api.day_schedule(date).await?;
        Ok(Self { date, slots })
    }

    /// Flips the slot whose `time` matches. Booked, in-flight and unknown
    /// slots are left alone without a backend call. On success the board is
    /// re-read from the backend; a failed re-read keeps the optimistic view.
    pub async fn toggle<A: ScheduleApi + ?Sized>(
        &mut self,
        api: &A,
        slot_time: &str,
    ) -> Result<ToggleOutcome, ApiError> {
        let Some(index) = self.slots.iter().position(|slot| slot.time == slot_time) else {
            return Ok(ToggleOutcome::Ignored);
        };
        let Some(toggle) = Toggle::for_status(self.slots[index].status) else {
            return Ok(ToggleOutcome::Ignored);
        };

        let request = async {
            match toggle {
                Toggle::Block => api.block_slot(slot_time).await,
                Toggle::Unblock => api.unblock_slot(slot_time).await,
            }
        };
        optimistic(
            &mut self.slots,
            |slots| slots[index].status = SlotStatus::Processing,
            request,
        )
        .await?;

        match api.day_schedule(self.date).await {
            Ok(fresh) => self.slots = fresh,
            Err(err) => log::warn!("schedule refresh after toggle failed: {err}"),
        }
        Ok(ToggleOutcome::Toggled(toggle))
    }
}

/// Parses the absence form. A blank end date means a single-day absence.
pub fn absence_range(start: &str, end: &str) -> Result<(NaiveDate, NaiveDate), &'static str> {
    let start = NaiveDate::parse_from_str(start.trim(), "%Y-%m-%d")
        .map_err(|_| MISSING_START_MESSAGE)?;
    let end = match end.trim() {
        "" => start,
        raw => NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| MISSING_START_MESSAGE)?,
    };
    if end < start {
        return Err(REVERSED_RANGE_MESSAGE);
    }
    Ok((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::cell::RefCell;

    struct FakeSchedule {
        slots: RefCell<Vec<Slot>>,
        fail_toggle: bool,
        calls: RefCell<Vec<String>>,
    }

    impl FakeSchedule {
        fn new(slots: Vec<Slot>) -> Self {
            Self {
                slots: RefCell::new(slots),
                fail_toggle: false,
                calls: RefCell::new(Vec::new()),
            }
        }

        fn set(&self, time: &str, status: SlotStatus) -> Result<(), ApiError> {
            if self.fail_toggle {
                return Err(ApiError::Decode("boom".to_string()));
            }
            for slot in self.slots.borrow_mut().iter_mut() {
                if slot.time == time {
                    slot.status = status;
                }
            }
            Ok(())
        }
    }

    #[async_trait(?Send)]
    impl ScheduleApi for FakeSchedule {
        async fn day_schedule(&self, _date: NaiveDate) -> Result<Vec<Slot>, ApiError> {
            self.calls.borrow_mut().push("schedule".to_string());
            Ok(self.slots.borrow().clone())
        }

        async fn block_slot(&self, slot_time: &str) -> Result<(), ApiError> {
            self.calls.borrow_mut().push(format!("block {slot_time}"));
            self.set(slot_time, SlotStatus::Blocked)
        }

        async fn unblock_slot(&self, slot_time: &str) -> Result<(), ApiError> {
            self.calls.borrow_mut().push(format!("unblock {slot_time}"));
            self.set(slot_time, SlotStatus::Available)
        }
    }

    fn slot(time: &str, status: SlotStatus) -> Slot {
        Slot {
            time: time.to_string(),
            status,
        }
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 10).unwrap()
    }

    fn board() -> Vec<Slot> {
        vec![
            slot("09:00", SlotStatus::Available),
            slot("09:30", SlotStatus::Blocked),
            slot("10:00", SlotStatus::Booked),
        ]
    }

    #[actix_web::test]
    async fn blocking_an_available_slot_reconciles_with_backend() {
        let api = FakeSchedule::new(board());
        let mut day_board = DayBoard::load(&api, day()).await.unwrap();

        let outcome = day_board.toggle(&api, "09:00").await.unwrap();

        assert_eq!(outcome, ToggleOutcome::Toggled(Toggle::Block));
        assert_eq!(day_board.slots[0].status, SlotStatus::Blocked);
        assert_eq!(
            *api.calls.borrow(),
            vec!["schedule", "block 09:00", "schedule"]
        );
    }

    #[actix_web::test]
    async fn unblocking_uses_the_delete_call() {
        let api = FakeSchedule::new(board());
        let mut day_board = DayBoard::load(&api, day()).await.unwrap();

        let outcome = day_board.toggle(&api, "09:30").await.unwrap();

        assert_eq!(outcome, ToggleOutcome::Toggled(Toggle::Unblock));
        assert_eq!(day_board.slots[1].status, SlotStatus::Available);
        assert!(api.calls.borrow().contains(&"unblock 09:30".to_string()));
        assert_eq!(Toggle::Unblock.message(), "Horário desbloqueado!");
    }

    #[actix_web::test]
    async fn booked_and_processing_slots_are_not_clickable() {
        let mut slots = board();
        slots.push(slot("10:30", SlotStatus::Processing));
        let api = FakeSchedule::new(slots);
        let mut day_board = DayBoard::load(&api, day()).await.unwrap();
        let before = day_board.clone();

        assert_eq!(day_board.toggle(&api, "10:00").await.unwrap(), ToggleOutcome::Ignored);
        assert_eq!(day_board.toggle(&api, "10:30").await.unwrap(), ToggleOutcome::Ignored);
        assert_eq!(day_board.toggle(&api, "23:00").await.unwrap(), ToggleOutcome::Ignored);

        assert_eq!(day_board, before);
        assert_eq!(*api.calls.borrow(), vec!["schedule"]);
    }

    #[actix_web::test]
    async fn failed_toggle_restores_the_snapshot() {
        let mut api = FakeSchedule::new(board());
        api.fail_toggle = true;
        let mut day_board = DayBoard::load(&api, day()).await.unwrap();
        let before = day_board.clone();

        let result = day_board.toggle(&api, "09:00").await;

        assert!(result.is_err());
        assert_eq!(day_board, before);
        assert_eq!(*api.calls.borrow(), vec!["schedule", "block 09:00"]);
    }

    #[actix_web::test]
    async fn optimistic_change_sticks_only_on_success() {
        let mut slots = board();
        let kept: Result<(), ApiError> = optimistic(
            &mut slots,
            |slots| slots[0].status = SlotStatus::Processing,
            async { Ok(()) },
        )
        .await;
        assert!(kept.is_ok());
        assert_eq!(slots[0].status, SlotStatus::Processing);

        let mut slots = board();
        let rolled_back: Result<(), ApiError> = optimistic(
            &mut slots,
            |slots| slots[0].status = SlotStatus::Processing,
            async { Err(ApiError::Decode("offline".to_string())) },
        )
        .await;
        assert!(rolled_back.is_err());
        assert_eq!(slots, board());
    }

    #[test]
    fn absence_end_defaults_to_start() {
        let (start, end) = absence_range("2025-07-01", "  ").unwrap();
        assert_eq!(start, end);
        assert_eq!(start, NaiveDate::from_ymd_opt(2025, 7, 1).unwrap());
    }

    #[test]
    fn absence_range_rejects_reversed_and_missing_dates() {
        assert_eq!(
            absence_range("2025-07-10", "2025-07-01"),
            Err(REVERSED_RANGE_MESSAGE)
        );
        assert_eq!(absence_range("", "2025-07-01"), Err(MISSING_START_MESSAGE));
        assert!(absence_range("2025-07-01", "2025-07-03").is_ok());
    }
}
