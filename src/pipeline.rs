//! Циклический конвейер из двух инкрементирующих узлов.
//!
//! Каждый узел принимает `Int32`, ждёт период, увеличивает значение на месте
//! и пересылает тот же слот дальше. Два узла, замкнутые через пару топиков,
//! гоняют одно сообщение по кругу; адрес нагрузки при этом не меняется.

use std::{cell::Cell, rc::Rc, time::Duration};

use intrabus_error::{ErrorExt, IntrabusResult, ResultExt};
use tracing::{error, info, warn};

use crate::{
    config::PipelineConfig, Context, Executor, Node, PublishOutcome, Publisher, Slot, SlotId,
};

/// Сообщение конвейера.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Int32 {
    pub data: i32,
}

/// Что видел узел конвейера.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipeStats {
    pub received: u64,
    pub forwarded: u64,
    /// Значение после последнего инкремента.
    pub last_value: Option<i32>,
    /// Адрес последнего полученного сообщения.
    pub last_identity: Option<SlotId>,
}

/// Общий на весь цикл счётчик оставшихся инкрементов.
#[derive(Debug, Clone)]
pub struct IterationLimit {
    remaining: Rc<Cell<u64>>,
}

impl IterationLimit {
    pub fn new(iterations: u64) -> Self {
        Self {
            remaining: Rc::new(Cell::new(iterations)),
        }
    }

    pub fn remaining(&self) -> u64 {
        self.remaining.get()
    }

    /// Списывает один инкремент. `true`, если лимит исчерпан.
    fn consume(&self) -> bool {
        let left = self.remaining.get().saturating_sub(1);
        self.remaining.set(left);
        left == 0
    }
}

/// Узел: принимает `Int32` из `input`, ждёт `period`, увеличивает значение и
/// публикует тот же слот в `output`.
///
/// Если ожидание прервано остановкой, сообщение отбрасывается без
/// пересылки.
pub struct IncrementerPipe {
    node: Node,
    publisher: Publisher<Int32>,
    stats: Rc<Cell<PipeStats>>,
}

impl IncrementerPipe {
    pub fn new(
        context: &Context,
        name: &str,
        input: &str,
        output: &str,
        period: Duration,
        limit: Option<IterationLimit>,
    ) -> IntrabusResult<Self> {
        let mut node = Node::new(context, name).with_context(|| format!("creating node '{name}'"))?;
        let publisher = node
            .create_publisher::<Int32>(output)
            .with_context(|| format!("creating publisher on '{output}'"))?;

        let stats = Rc::new(Cell::new(PipeStats::default()));
        let handle = node.handle();
        let out = publisher.clone();
        let st = stats.clone();

        node.create_subscription::<Int32, _>(input, move |mut slot: Slot<Int32>| {
            let Ok(identity) = slot.identity() else {
                error!(node = %handle.name(), "received an empty slot");
                return;
            };
            let Ok(msg) = slot.get_mut() else {
                return;
            };
            info!(node = %handle.name(), value = msg.data, address = %identity, "received message");
            update(&st, |s| {
                s.received += 1;
                s.last_identity = Some(identity);
            });

            info!(node = %handle.name(), period_ms = period.as_millis() as u64, "sleeping");
            if let Err(err) = handle.sleep_for(period) {
                if err.status_code().is_recoverable() {
                    info!(node = %handle.name(), value = msg.data, "wait cancelled, message dropped");
                } else {
                    warn!(node = %handle.name(), value = msg.data, error = %err, "wait failed, message dropped");
                }
                return;
            }

            msg.data = msg.data.wrapping_add(1);
            let value = msg.data;
            info!(node = %handle.name(), value, address = %identity, "incrementing and sending");
            out.publish(slot);
            update(&st, |s| {
                s.forwarded += 1;
                s.last_value = Some(value);
            });

            if limit.as_ref().is_some_and(IterationLimit::consume) {
                info!(node = %handle.name(), value, "iteration limit reached");
                handle.request_shutdown();
            }
        })
        .with_context(|| format!("subscribing to '{input}'"))?;

        Ok(Self {
            node,
            publisher,
            stats,
        })
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn publisher(&self) -> &Publisher<Int32> {
        &self.publisher
    }

    pub fn stats(&self) -> PipeStats {
        self.stats.get()
    }
}

fn update(
    stats: &Cell<PipeStats>,
    f: impl FnOnce(&mut PipeStats),
) {
    let mut s = stats.get();
    f(&mut s);
    stats.set(s);
}

/// Два узла, замкнутые в цикл: `first` слушает первый топик и пишет во
/// второй, `second` наоборот.
pub struct Cycle {
    pub first: IncrementerPipe,
    pub second: IncrementerPipe,
    limit: Option<IterationLimit>,
}

impl Cycle {
    /// Запускает цикл: публикует начальное значение издателем первого узла.
    pub fn seed(
        &self,
        value: i32,
    ) -> PublishOutcome {
        let slot = Slot::new(Int32 { data: value });
        if let Ok(identity) = slot.identity() {
            info!(value, address = %identity, "published first message");
        }
        self.first.publisher().publish(slot)
    }

    /// Добавляет оба узла в исполнитель.
    pub fn register(
        &self,
        executor: &Executor,
    ) -> IntrabusResult<()> {
        for pipe in [&self.first, &self.second] {
            executor
                .add_node(pipe.node())
                .with_context(|| format!("adding node '{}'", pipe.node().name()))?;
        }
        Ok(())
    }

    /// Сколько инкрементов осталось до остановки, если лимит задан.
    pub fn remaining_iterations(&self) -> Option<u64> {
        self.limit.as_ref().map(IterationLimit::remaining)
    }
}

/// Собирает цикл по настройкам. Узлы ещё не добавлены в исполнитель.
pub fn build_cycle(
    context: &Context,
    config: &PipelineConfig,
) -> IntrabusResult<Cycle> {
    let period = Duration::from_millis(config.period_ms);
    let limit = config.max_iterations.map(IterationLimit::new);

    let first = IncrementerPipe::new(
        context,
        "producer",
        &config.first_topic,
        &config.second_topic,
        period,
        limit.clone(),
    )
    .context("building first pipe")?;
    let second = IncrementerPipe::new(
        context,
        "producer",
        &config.second_topic,
        &config.first_topic,
        period,
        limit.clone(),
    )
    .context("building second pipe")?;

    Ok(Cycle {
        first,
        second,
        limit,
    })
}
